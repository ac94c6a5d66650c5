//! Launch session pages.
//!
//! Minimal server-rendered HTML: a session page for resource launches and
//! a content picker for deep-linking launches. The session token is
//! embedded so the page (or an external UI) can drive the AGS/NRPS routes.

use crate::deep_linking::escape_html;
use crate::launch::LaunchContext;

/// Session page for a validated resource launch.
pub(crate) fn session_page(context: &LaunchContext, ltik: &str) -> String {
    let roles = serde_json::to_string(&context.roles).unwrap_or_else(|_| "[]".to_string());
    let resource_link_id = context.resource_link_id().unwrap_or("");
    let context_id = context
        .context
        .as_ref()
        .map(|c| c.id.as_str())
        .unwrap_or("");
    let nrps = context.names_roles_url.as_deref().unwrap_or("(not advertised)");
    let lineitems = context.line_items_url().unwrap_or("(not advertised)");

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8"/>
    <title>LTI launch</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 20px; }}
      code {{ background: #f6f8fa; padding: 2px 4px; border-radius: 4px; }}
      td {{ padding: 4px 8px; }}
    </style>
  </head>
  <body>
    <h1>LTI launch</h1>
    <table>
      <tr><td>User</td><td><code>{user}</code></td></tr>
      <tr><td>Name</td><td>{name}</td></tr>
      <tr><td>Roles</td><td><code>{roles}</code></td></tr>
      <tr><td>Resource link</td><td><code id="resId">{resource_link_id}</code></td></tr>
      <tr><td>Context</td><td><code id="ctxId">{context_id}</code></td></tr>
      <tr><td>Line items</td><td><code>{lineitems}</code></td></tr>
      <tr><td>NRPS</td><td><code>{nrps}</code></td></tr>
      <tr><td>Session</td><td><code id="ltik">{ltik}</code></td></tr>
    </table>
    <p>Service routes: <code>/ags/lineitems</code>, <code>/nrps/members</code>
       (pass <code>?ltik=...</code>).</p>
  </body>
</html>"#,
        user = escape_html(&context.user_id),
        name = escape_html(context.name.as_deref().unwrap_or("")),
        roles = escape_html(&roles),
        resource_link_id = escape_html(resource_link_id),
        context_id = escape_html(context_id),
        lineitems = escape_html(lineitems),
        nrps = escape_html(nrps),
        ltik = escape_html(ltik),
    )
}

/// Content picker for a deep-linking launch.
pub(crate) fn picker_page(context: &LaunchContext, ltik: &str, default_url: &str) -> String {
    let accept_types = context
        .deep_linking
        .as_ref()
        .map(|s| s.accept_types.join(", "))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8"/>
    <title>Select content</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 20px; }}
      label {{ display: inline-block; min-width: 100px; }}
      .row {{ margin: 8px 0; }}
    </style>
  </head>
  <body>
    <h1>Select content</h1>
    <p>Accepted types: <code>{accept_types}</code></p>
    <form method="post" action="/deeplink/submit">
      <input type="hidden" name="ltik" value="{ltik}"/>
      <div class="row">
        <label>Title</label>
        <input name="title" value="Sample Content"/>
      </div>
      <div class="row">
        <label>URL</label>
        <input name="url" size="60" value="{default_url}"/>
      </div>
      <div class="row">
        <button type="submit">Submit to platform</button>
      </div>
    </form>
  </body>
</html>"#,
        accept_types = escape_html(&accept_types),
        ltik = escape_html(ltik),
        default_url = escape_html(default_url),
    )
}
