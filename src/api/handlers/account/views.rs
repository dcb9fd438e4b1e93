//! HTML rendering for the account pages.
//!
//! Every user-supplied value goes through [`escape_html`] before it reaches
//! the markup.

use url::form_urlencoded;

use super::{
    antiforgery::FIELD_NAME,
    forms::{FormErrors, RegisterForm},
};

pub fn escape_html(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

fn base_style() -> &'static str {
    r"
    body { font-family: system-ui, sans-serif; margin: 0; background: #f5f5f7; color: #1d1d1f; }
    nav { background: #1a1a2e; padding: 12px 24px; }
    nav a { color: #fff; margin-right: 16px; text-decoration: none; }
    main { max-width: 420px; margin: 40px auto; background: #fff; padding: 24px; border-radius: 12px; }
    .form-group { margin-bottom: 14px; }
    .form-group label { display: block; font-size: 14px; margin-bottom: 4px; }
    .form-group input[type=text], .form-group input[type=email], .form-group input[type=password] {
        width: 100%; padding: 8px; box-sizing: border-box;
    }
    .field-validation-error, .validation-summary-errors { color: #c0392b; font-size: 13px; }
    button { padding: 10px 16px; border: 0; border-radius: 8px; background: #1a1a2e; color: #fff; }
    "
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title} - Membership</title>
<style>{style}</style>
</head><body>
<nav><a href="/">Home</a><a href="/Account/Register">Register</a><a href="/Account/Login">Login</a></nav>
<main>
<h1>{title}</h1>
{body}
</main>
</body></html>"#,
        title = escape_html(title),
        style = base_style(),
    )
}

fn validation_summary(errors: &FormErrors) -> String {
    if errors.form().is_empty() {
        return String::new();
    }
    let items: String = errors
        .form()
        .iter()
        .map(|message| format!("<li>{}</li>", escape_html(message)))
        .collect();
    format!(r#"<div class="validation-summary-errors" role="alert"><ul>{items}</ul></div>"#)
}

fn field_error(errors: &FormErrors, field: &str) -> String {
    errors
        .field(field)
        .map(|message| {
            format!(
                r#"<span class="field-validation-error" data-valmsg-for="{field}">{}</span>"#,
                escape_html(message)
            )
        })
        .unwrap_or_default()
}

fn token_input(token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{FIELD_NAME}" value="{}">"#,
        escape_html(token)
    )
}

/// Registration form, optionally re-populated. Password inputs are never
/// echoed back.
pub fn render_register(form: Option<&RegisterForm>, errors: &FormErrors, token: &str) -> String {
    let first_name = form.map(|f| escape_html(&f.first_name)).unwrap_or_default();
    let last_name = form.map(|f| escape_html(&f.last_name)).unwrap_or_default();
    let email = form.map(|f| escape_html(&f.email)).unwrap_or_default();

    let body = format!(
        r#"{summary}
<form method="post" action="/Account/Register">
  {token}
  <div class="form-group">
    <label for="FirstName">First name</label>
    <input type="text" id="FirstName" name="FirstName" value="{first_name}">
  </div>
  <div class="form-group">
    <label for="LastName">Last name</label>
    <input type="text" id="LastName" name="LastName" value="{last_name}">
  </div>
  <div class="form-group">
    <label for="Email">Email</label>
    <input type="email" id="Email" name="Email" value="{email}" autocomplete="username">
    {email_error}
  </div>
  <div class="form-group">
    <label for="Password">Password</label>
    <input type="password" id="Password" name="Password" autocomplete="new-password">
    {password_error}
  </div>
  <div class="form-group">
    <label for="ConfirmPassword">Confirm password</label>
    <input type="password" id="ConfirmPassword" name="ConfirmPassword" autocomplete="new-password">
    {confirm_error}
  </div>
  <button type="submit">Register</button>
</form>"#,
        summary = validation_summary(errors),
        token = token_input(token),
        email_error = field_error(errors, "Email"),
        password_error = field_error(errors, "Password"),
        confirm_error = field_error(errors, "ConfirmPassword"),
    );
    layout("Register", &body)
}

/// Login form. `return_url` travels on the form action so it survives the POST.
pub fn render_login(
    email: &str,
    return_url: Option<&str>,
    errors: &FormErrors,
    token: &str,
) -> String {
    let action = match return_url.filter(|url| !url.is_empty()) {
        Some(url) => {
            let encoded: String = form_urlencoded::byte_serialize(url.as_bytes()).collect();
            format!("/Account/Login?returnUrl={encoded}")
        }
        None => "/Account/Login".to_string(),
    };

    let body = format!(
        r#"{summary}
<form method="post" action="{action}">
  {token}
  <div class="form-group">
    <label for="Email">Email</label>
    <input type="email" id="Email" name="Email" value="{email}" autocomplete="username">
    {email_error}
  </div>
  <div class="form-group">
    <label for="Password">Password</label>
    <input type="password" id="Password" name="Password" autocomplete="current-password">
    {password_error}
  </div>
  <div class="form-group">
    <label><input type="checkbox" name="RememberMe" value="true"> Remember me</label>
  </div>
  <button type="submit">Log in</button>
</form>"#,
        summary = validation_summary(errors),
        action = escape_html(&action),
        token = token_input(token),
        email = escape_html(email),
        email_error = field_error(errors, "Email"),
        password_error = field_error(errors, "Password"),
    );
    layout("Login", &body)
}

/// Home page. Signed-in users get a greeting and a logout button.
pub fn render_home(user_name: Option<&str>, token: &str) -> String {
    let body = match user_name {
        Some(name) => format!(
            r#"<p>Hello {name}!</p>
<form method="post" action="/Account/Logout">
  {token}
  <button type="submit">Log out</button>
</form>"#,
            name = escape_html(name),
            token = token_input(token),
        ),
        None => r#"<p>You are not signed in. <a href="/Account/Login">Log in</a> or <a href="/Account/Register">register</a>.</p>"#
            .to_string(),
    };
    layout("Home", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn register_view_escapes_and_hides_passwords() {
        let form = RegisterForm {
            email: "<script>@x.y".to_string(),
            password: "Secret1!".to_string(),
            ..RegisterForm::default()
        };
        let html = render_register(Some(&form), &FormErrors::default(), "tok");
        assert!(html.contains("&lt;script&gt;@x.y"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("Secret1!"));
        assert!(html.contains(r#"name="__RequestVerificationToken" value="tok""#));
    }

    #[test]
    fn summary_and_field_errors_render() {
        let mut errors = FormErrors::default();
        errors.add_form("Email 'a@b.c' is already taken.");
        errors.add_field("Password", "The Password field is required.");
        let html = render_register(None, &errors, "tok");
        assert!(html.contains("validation-summary-errors"));
        assert!(html.contains("Email &#39;a@b.c&#39; is already taken."));
        assert!(html.contains(r#"data-valmsg-for="Password">The Password field is required."#));
    }

    #[test]
    fn login_view_carries_return_url() {
        let html = render_login("", Some("/dashboard?tab=1"), &FormErrors::default(), "tok");
        assert!(html.contains(r#"action="/Account/Login?returnUrl=%2Fdashboard%3Ftab%3D1""#));

        let html = render_login("", None, &FormErrors::default(), "tok");
        assert!(html.contains(r#"action="/Account/Login""#));
    }

    #[test]
    fn home_view_greets_user() {
        let html = render_home(Some("ada@example.com"), "tok");
        assert!(html.contains("Hello ada@example.com!"));
        assert!(html.contains(r#"action="/Account/Logout""#));

        let html = render_home(None, "tok");
        assert!(html.contains("You are not signed in."));
    }
}
