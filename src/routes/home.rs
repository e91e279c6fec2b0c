// routes/home.rs
// GET / -> login form posting JSON to /login; GET /healthz -> liveness.

use axum::response::Html;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn home() -> Html<&'static str> {
    Html(r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Authenticators - Login</title>
</head>
<body>
  <main>
    <form id="login-form">
      <label>
        Email
        <input id="email" name="email" type="email" required>
      </label>
      <label>
        Code
        <input id="code" name="code" inputmode="numeric" pattern="\d*" autocomplete="one-time-code" required>
      </label>
      <button type="submit">Sign in</button>
    </form>
    <pre id="result"></pre>
  </main>
  <script>
    const form = document.getElementById('login-form');
    const result = document.getElementById('result');

    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      const body = {
        email: form.email.value.trim(),
        code: form.code.value.trim()
      };

      try {
        const response = await fetch('/login', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify(body)
        });
        if (response.ok) {
          window.location.href = '/authenticators';
          return;
        }
        result.textContent = await response.text();
      } catch (err) {
        result.textContent = 'Login request failed';
      }
    });
  </script>
</body>
</html>
"#)
}
