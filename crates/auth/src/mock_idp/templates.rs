//! HTML templates for the Mock IdP login pages.

use socialgate_core::auth::Provider;

/// Escape HTML special characters to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Auto-submitting form that mimics Apple's `response_mode=form_post`.
///
/// Apple posts `code` and `state` (and `user` on a first sign-in) back to the
/// redirect URI instead of appending them to its query string.
pub fn form_post_page(redirect_uri: &str, code: &str, state: &str, user: Option<&str>) -> String {
    let user_input = user
        .map(|u| format!(r#"<input type="hidden" name="user" value="{}" />"#, html_escape(u)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Redirecting...</title>
</head>
<body onload="document.forms[0].submit()">
    <form method="POST" action="{redirect_uri}">
        <input type="hidden" name="code" value="{code}" />
        <input type="hidden" name="state" value="{state}" />
        {user_input}
        <noscript>
            <button type="submit">Continue</button>
        </noscript>
    </form>
</body>
</html>"#,
        redirect_uri = html_escape(redirect_uri),
        code = html_escape(code),
        state = html_escape(state),
    )
}

/// Login page for `provider`, posting the simulated user to `/authorize/submit`.
pub fn login_page(
    provider: Provider,
    state: &str,
    redirect_uri: &str,
    code_challenge: Option<&str>,
) -> String {
    let provider_name = match provider {
        Provider::Google => "Google",
        Provider::Meta => "Facebook",
        Provider::Apple => "Apple",
    };
    let state = html_escape(state);
    let redirect_uri = html_escape(redirect_uri);
    let code_challenge = html_escape(code_challenge.unwrap_or_default());

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Mock {provider_name} Sign In</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 24rem; margin: 4rem auto; }}
        .notice {{ background: #fff8e1; border: 1px solid #f0c36d; padding: 0.75rem 1rem; border-radius: 6px; }}
        label, input, button {{ display: block; width: 100%; box-sizing: border-box; }}
        input {{ padding: 0.5rem; margin: 0.25rem 0 1rem; }}
        button {{ padding: 0.75rem; cursor: pointer; }}
    </style>
</head>
<body>
    <div class="notice">
        <h2>Mock identity provider</h2>
        <p>No account is checked: whatever you enter here is what the
        <strong>{provider_name}</strong> callback will receive.</p>
    </div>

    <form action="/authorize/submit" method="POST">
        <input type="hidden" name="provider" value="{}" />
        <input type="hidden" name="state" value="{state}" />
        <input type="hidden" name="redirect_uri" value="{redirect_uri}" />
        <input type="hidden" name="code_challenge" value="{code_challenge}" />

        <label for="email">Email Address</label>
        <input type="email" id="email" name="email" placeholder="dev@example.com" required />

        <label for="name">Name (optional)</label>
        <input type="text" id="name" name="name" placeholder="Dev User" />

        <button type="submit">Sign in with {provider_name}</button>
    </form>
</body>
</html>"#,
        provider
    )
}
