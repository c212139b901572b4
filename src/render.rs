//! HTML pages, built with maud. Every dynamic value is escaped.

use chrono::DateTime;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::models::{Post, User};

const PAGE_CSS: &str = r#"
*{box-sizing:border-box}
body{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;line-height:1.6;color:#222;background:#fafafa;margin:0}
nav{display:flex;gap:1rem;padding:.75rem 1.5rem;background:#fff;border-bottom:1px solid #e5e5e5}
nav .right{margin-left:auto;display:flex;gap:1rem}
main{max-width:720px;margin:1.5rem auto;padding:0 1rem}
a{color:#2a5db0;text-decoration:none}
a:hover{text-decoration:underline}
.post{padding:1rem 0;border-bottom:1px solid #eee}
.meta{color:#888;font-size:.85rem}
.error{color:#b00020}
form.stacked label{display:block;margin-top:.75rem}
form.stacked input,form.stacked textarea{width:100%;padding:.4rem}
[contenteditable=true]{outline:1px dashed #ccc;padding:2px}
button.danger{color:#fff;background:#b00020;border:0;padding:.4rem .8rem;cursor:pointer}
"#;

/// Post creation time in the classic `Jan _2 15:04:05` stamp layout (UTC).
pub fn format_time(created: i64) -> String {
    DateTime::from_timestamp(created, 0)
        .map(|t| t.format("%b %e %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// `authuser` is `None` on error pages, which do not know who is asking and
/// leave the account links out.
fn layout(title: &str, authuser: Option<&User>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                nav {
                    a href="/" { "Home" }
                    a href="/users" { "Users" }
                    @if let Some(authuser) = authuser {
                        div class="right" {
                            @if authuser.is_authenticated() {
                                a href={ "/users/" (authuser.id) } { (authuser.name) }
                                a href="/logout" { "Logout" }
                            } @else {
                                a href="/login" { "Login" }
                                a href="/register" { "Register" }
                            }
                        }
                    }
                }
                main {
                    div id="errors" class="error" {}
                    (content)
                }
                script src="/js/main.js" {}
            }
        }
    }
}

fn post_summary(post: &Post) -> Markup {
    html! {
        div class="post" {
            h2 { a href={ "/p/" (post.url) } { (post.title) } }
            p class="meta" {
                (format_time(post.created)) " · "
                a href={ "/posts/" (post.id) } { "#" (post.id) }
            }
        }
    }
}

pub fn posts_page(authuser: &User, posts: &[Post], error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Posts" }
        @for post in posts {
            (post_summary(post))
        }
        @if authuser.is_authenticated() {
            h2 { "New post" }
            @if let Some(error) = error {
                p class="error" { (error) }
            }
            form class="stacked" method="post" action="/posts" {
                label for="Title" { "Title" }
                input type="text" id="Title" name="Title";
                label for="Body" { "Body" }
                textarea id="Body" name="Body" rows="6" {}
                button type="submit" { "Publish" }
            }
        }
    };
    layout("HomePage", Some(authuser), content)
}

pub fn post_page(authuser: &User, post: &Post) -> Markup {
    let owner = authuser.owns(post.user_id);
    let content = html! {
        article {
            @if owner {
                input type="hidden" id="postid" value=(post.id);
                h1 id="posttitle" class="postedit" contenteditable="true" { (post.title) }
                div id="postbody" class="postedit" contenteditable="true" { (post.body) }
            } @else {
                h1 { (post.title) }
                div { (post.body) }
            }
            p class="meta" {
                (format_time(post.created)) " · by "
                a href={ "/users/" (post.user_id) } { "user " (post.user_id) }
            }
            @if owner {
                button type="button" class="delete_post danger" rel=(post.id) { "Delete post" }
            }
        }
    };
    layout(&format!("{} more custom", post.title), Some(authuser), content)
}

pub fn users_page(authuser: &User, users: &[User]) -> Markup {
    let content = html! {
        h1 { "Users" }
        ul {
            @for user in users {
                li { a href={ "/users/" (user.id) } { (user.name) } " (" (user.email) ")" }
            }
        }
    };
    layout("Users listing", Some(authuser), content)
}

pub fn user_page(authuser: &User, user: &User, posts: &[Post]) -> Markup {
    let own_profile = authuser.owns(user.id);
    let content = html! {
        @if own_profile {
            input type="hidden" id="userid" value=(user.id);
            form class="stacked" onsubmit="return false" {
                label for="username" { "Name" }
                input type="text" id="username" class="useredit" value=(user.name);
                label for="useremail" { "Email" }
                input type="email" id="useremail" class="useredit" value=(user.email);
                label for="userpassword" { "New password" }
                input type="password" id="userpassword" class="useredit" placeholder="leave blank to keep";
            }
            p { button type="button" class="delete_user danger" rel=(user.id) { "Delete account" } }
        } @else {
            h1 { (user.name) }
            p class="meta" { (user.email) }
        }
        h2 { "Posts" }
        @for post in posts {
            (post_summary(post))
        }
    };
    layout(&format!("{} profile page", user.name), Some(authuser), content)
}

pub fn login_page(next: Option<&str>, error: Option<&str>) -> Markup {
    let action = match next {
        Some(next) => crate::session::login_url(next),
        None => "/login".to_string(),
    };
    let content = html! {
        h1 { "Login" }
        @if let Some(error) = error {
            p class="error" { (error) }
        }
        form class="stacked" method="post" action=(action) {
            label for="email" { "Email" }
            input type="email" id="email" name="email";
            label for="password" { "Password" }
            input type="password" id="password" name="password";
            button type="submit" { "Login" }
        }
        p { "No account? " a href="/register" { "Register" } }
    };
    layout("Login", Some(&User::default()), content)
}

pub fn register_page(error: Option<&str>) -> Markup {
    let content = html! {
        h1 { "Register" }
        @if let Some(error) = error {
            p class="error" { (error) }
        }
        form class="stacked" method="post" action="/users" {
            label for="name" { "Name" }
            input type="text" id="name" name="name";
            label for="email" { "Email" }
            input type="email" id="email" name="email";
            label for="password" { "Password" }
            input type="password" id="password" name="password";
            button type="submit" { "Register" }
        }
    };
    layout("Registration", Some(&User::default()), content)
}

pub fn error_page(title: &str, message: &str) -> Markup {
    let content = html! {
        h1 { (title) }
        p { (message) }
        a href="/" { "Back to the home page" }
    };
    layout(title, None, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> User {
        let mut bob = User::new("bob@domain.com", "hash", "Bob", true);
        bob.id = 1;
        bob
    }

    fn post(user_id: i64) -> Post {
        Post {
            id: 3,
            created: 0,
            title: "<script>alert(1)</script>".into(),
            body: "Lorem ipsum".into(),
            user_id,
            url: "script-alert-1-script".into(),
        }
    }

    #[test]
    fn stamp_layout() {
        assert_eq!(format_time(0), "Jan  1 00:00:00");
        assert_eq!(format_time(1_700_000_000), "Nov 14 22:13:20");
    }

    #[test]
    fn titles_are_escaped() {
        let page = post_page(&User::default(), &post(1)).into_string();
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn owner_sees_edit_controls() {
        let owner_view = post_page(&bob(), &post(1)).into_string();
        assert!(owner_view.contains("delete_post"));
        assert!(owner_view.contains("contenteditable"));

        let visitor_view = post_page(&bob(), &post(2)).into_string();
        assert!(!visitor_view.contains("delete_post"));
    }

    #[test]
    fn new_post_form_only_when_logged_in() {
        assert!(posts_page(&bob(), &[], None).into_string().contains("action=\"/posts\""));
        assert!(!posts_page(&User::default(), &[], None)
            .into_string()
            .contains("action=\"/posts\""));
    }

    #[test]
    fn error_page_has_no_account_links() {
        let page = error_page("404 Not Found Error", "This is not found").into_string();
        assert!(page.contains("This is not found"));
        assert!(!page.contains("href=\"/login\""));
        assert!(!page.contains("href=\"/logout\""));
    }

    #[test]
    fn login_form_keeps_next() {
        let page = login_page(Some("/users/1"), None).into_string();
        assert!(page.contains("/login?next=%2Fusers%2F1"));
    }
}
