//! HTML pages: sign-in, registration and the dashboard.
//!
//! Markup is deliberately bare. The forms post to the auth actions and branch
//! on the JSON verdict; the dashboard seeds the counter over the JSON API and
//! follows it live over server-sent events.

use crate::session::Session;
use axum::{extract::Extension, response::Html};

const HOME_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Sign in</title>
</head>
<body>
<h1>Sign in</h1>
<form id="login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button>
</form>
<p id="error"></p>
<p><a href="/register">Create an account</a></p>
<script>
const form = document.getElementById('login');
form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const response = await fetch('/api/auth/login', {
    method: 'POST',
    body: new URLSearchParams(new FormData(form)),
  });
  const result = await response.json();
  if (result.success) {
    window.location.assign('/dashboard');
  } else {
    document.getElementById('error').textContent =
      result.error || 'Something went wrong. Please try again later.';
  }
});
</script>
</body>
</html>
"#;

const REGISTER_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Create account</title>
</head>
<body>
<h1>Create account</h1>
<form id="register">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<label>Confirm password <input type="password" name="passwordConfirm" required></label>
<button type="submit">Create account</button>
</form>
<p id="error"></p>
<p><a href="/">Back to sign in</a></p>
<script>
const form = document.getElementById('register');
form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const response = await fetch('/api/auth/register', {
    method: 'POST',
    body: new URLSearchParams(new FormData(form)),
  });
  const result = await response.json();
  if (result.success) {
    window.location.assign('/dashboard');
  } else {
    document.getElementById('error').textContent =
      result.error || 'Something went wrong. Please try again later.';
  }
});
</script>
</body>
</html>
"#;

const DASHBOARD_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Dashboard</title>
</head>
<body>
<h1>Dashboard</h1>
"#;

const DASHBOARD_TAIL: &str = r#"<form method="post" action="/api/auth/logout">
<button type="submit">Logout</button>
</form>
<section>
<h2>Total visits</h2>
<p id="count">&hellip;</p>
<button id="increment">+1</button>
<p id="counter-error"></p>
</section>
<script>
const count = document.getElementById('count');
const counterError = document.getElementById('counter-error');

fetch('/api/counter')
  .then((response) => {
    if (!response.ok) {
      throw new Error('counter unavailable');
    }
    return response.json();
  })
  .then((view) => {
    count.textContent = view.count;
  })
  .catch(() => {
    counterError.textContent = 'Failed to initialize counter. Please try again.';
  });

const source = new EventSource('/api/counter/events');
source.addEventListener('count', (event) => {
  count.textContent = JSON.parse(event.data).count;
});
source.addEventListener('feed-error', (event) => {
  counterError.textContent = event.data;
});

document.getElementById('increment').addEventListener('click', async () => {
  const response = await fetch('/api/counter/increment', { method: 'POST' });
  if (response.ok) {
    count.textContent = (await response.json()).count;
  } else {
    counterError.textContent = 'Failed to update counter. Please try again.';
  }
});
</script>
</body>
</html>
"#;

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

pub async fn register() -> Html<&'static str> {
    Html(REGISTER_PAGE)
}

/// The gate guarantees a live [`Session`] is in the request extensions before
/// this handler runs.
pub async fn dashboard(Extension(session): Extension<Session>) -> Html<String> {
    let email = escape_html(session.account.email.as_deref().unwrap_or("unknown"));
    let account = serde_json::to_string_pretty(&session.account)
        .map_or_else(|_| "{}".to_string(), |json| escape_html(&json));

    let mut page = String::from(DASHBOARD_HEAD);
    page.push_str(&format!("<p>Signed in as <strong>{email}</strong></p>\n"));
    page.push_str(&format!("<pre id=\"account\">{account}</pre>\n"));
    page.push_str(DASHBOARD_TAIL);

    Html(page)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
