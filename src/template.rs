use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::{
    catalog::Item,
    clock::{self, Remaining, Timestamp},
    css::STYLE,
};

/// A one-line banner above the page body.
pub enum Notice {
    Error(String),
    Success(String),
}

/// How much of the activation window the signed-in page can report.
pub enum Expiry {
    Remaining(Remaining),
    /// Window closed (or unreadable); show when it ended.
    EndedAt(String),
    Unknown,
}

pub enum View<'a> {
    Login {
        ttl_hours: u32,
    },
    Downloads {
        expiry: Expiry,
        items: &'a [Item],
        passcode_version: i64,
        now: Timestamp,
    },
}

fn shell(body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Downloads" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                div class="container" {
                    h1 { "Downloads" }
                    div class="sub" { "Enter the passcode to see the download list (external links)." }
                    (body)
                }
            }
        }
    }
}

pub fn page(notices: &[Notice], view: &View<'_>) -> Markup {
    shell(html! {
        @for notice in notices {
            @match notice {
                Notice::Error(text) => div class="err" { "⚠️ " (text) },
                Notice::Success(text) => div class="msg" { "✅ " (text) },
            }
        }
        @match view {
            View::Login { ttl_hours } => {
                (login_form(*ttl_hours))
            }
            View::Downloads { expiry, items, passcode_version, now } => {
                (downloads(expiry, items, *passcode_version, now))
            }
        }
    })
}

fn login_form(ttl_hours: u32) -> Markup {
    html! {
        div class="card" {
            div class="title" { "Enter passcode" }
            div class="sp" {}
            form method="post" action="/" autocomplete="off" {
                input type="hidden" name="action" value="login";
                div class="row" {
                    div class="grow" {
                        input type="password" name="user_passcode"
                            placeholder="Passcode" autofocus;
                    }
                    button class="btn" type="submit" { "Sign in" }
                }
                div class="sp" {}
                div class="hint" {
                    "The passcode is valid for "
                    strong { (ttl_hours) }
                    " hours from its "
                    strong { "first successful use" }
                    ". After that an administrator has to reset it."
                }
            }
        }
    }
}

fn downloads(expiry: &Expiry, items: &[Item], passcode_version: i64, now: &Timestamp) -> Markup {
    html! {
        div class="status" {
            span class="badge success" { "Signed in" }
            @match expiry {
                Expiry::Remaining(left) => span { "Time remaining: " (left) },
                Expiry::EndedAt(at) => span { "Expired at: " (at) },
                Expiry::Unknown => {},
            }
        }
        div class="hr" {}
        @if items.is_empty() {
            div class="card" {
                div class="title" { "Nothing to download right now" }
                div class="notes" { "Please check back later or ask the administrator to publish the list." }
            }
        } @else {
            div class="list" {
                @for item in items {
                    (item_card(item))
                }
            }
        }
        div class="footer" {
            div { "Passcode version: " (passcode_version) }
            div { "System time: " (clock::format_seconds(now)) }
        }
    }
}

/// Only plain web links become buttons.
fn link_target(url: &str) -> Option<&str> {
    let url = url.trim();
    let scheme = url.get(..url.find(':')?)?;
    (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")).then_some(url)
}

fn item_card(item: &Item) -> Markup {
    let title = if item.title.trim().is_empty() {
        "Untitled item"
    } else {
        item.title.as_str()
    };
    html! {
        div class="card" {
            div class="title" { (title) }
            @if let Some(notes) = &item.notes {
                div class="notes" { (notes) }
            }
            div class="sp" {}
            @if let Some(url) = item.url.as_deref().and_then(link_target) {
                a class="btn" href=(url) target="_blank" rel="noopener" { "Open link" }
            } @else {
                span class="badge danger" { "No link" }
            }
        }
    }
}
