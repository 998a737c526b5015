pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use store::ShortcutStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcutIcon {
    #[default]
    Gallery,
    Movie,
    Globe,
    Terminal,
}

impl ShortcutIcon {
    pub const ALL: [ShortcutIcon; 4] = [
        ShortcutIcon::Gallery,
        ShortcutIcon::Movie,
        ShortcutIcon::Globe,
        ShortcutIcon::Terminal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShortcutIcon::Gallery => "gallery",
            ShortcutIcon::Movie => "movie",
            ShortcutIcon::Globe => "globe",
            ShortcutIcon::Terminal => "terminal",
        }
    }
}

impl fmt::Display for ShortcutIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortcutIcon {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShortcutIcon::ALL
            .into_iter()
            .find(|icon| icon.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub id: String,
    pub title: String,
    pub url: String,
    pub icon: ShortcutIcon,
}

/// Client-supplied fields of a shortcut; the id is always server-owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInput {
    pub title: String,
    pub url: String,
    pub icon: ShortcutIcon,
}

impl ShortcutInput {
    pub fn normalized(&self) -> ShortcutInput {
        ShortcutInput {
            title: self.title.trim().to_string(),
            url: ensure_url_scheme(self.url.trim()),
            icon: self.icon,
        }
    }
}

/// Prepends `https://` unless the url already names http or https.
pub fn ensure_url_scheme(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if has_prefix_ignore_case(url, "http://") || has_prefix_ignore_case(url, "https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

/// Validates a request body. `None` when the shape is unusable.
pub fn parse_shortcut_input(body: &Value) -> Option<ShortcutInput> {
    let object = body.as_object()?;
    let title = object.get("title")?.as_str()?.trim();
    let url = object.get("url")?.as_str()?.trim();
    let icon = object.get("icon")?.as_str()?.parse::<ShortcutIcon>().ok()?;

    if title.is_empty() || url.is_empty() {
        return None;
    }

    Some(ShortcutInput {
        title: title.to_string(),
        url: ensure_url_scheme(url),
        icon,
    })
}

/// Turns one persisted JSON value into a shortcut, or `None` if it cannot be salvaged.
/// Unknown or missing icons become the default icon.
pub fn sanitize_record(value: &Value) -> Option<Shortcut> {
    let object = value.as_object()?;
    let id = object.get("id")?.as_str()?;
    let title = object.get("title")?.as_str()?.trim();
    let url = ensure_url_scheme(object.get("url")?.as_str()?.trim());
    let icon = object
        .get("icon")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<ShortcutIcon>().ok())
        .unwrap_or_default();

    if id.is_empty() || title.is_empty() || url.is_empty() {
        return None;
    }

    Some(Shortcut {
        id: id.to_string(),
        title: title.to_string(),
        url,
        icon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_url_scheme_cases() {
        assert_eq!(ensure_url_scheme("example.com"), "https://example.com");
        assert_eq!(ensure_url_scheme("http://x"), "http://x");
        assert_eq!(ensure_url_scheme("HTTPS://Upper.example"), "HTTPS://Upper.example");
        assert_eq!(ensure_url_scheme(""), "");
        assert_eq!(ensure_url_scheme("ftp://files"), "https://ftp://files");
    }

    #[test]
    fn icons_round_trip_through_strings() {
        for icon in ShortcutIcon::ALL {
            assert_eq!(icon.as_str().parse::<ShortcutIcon>(), Ok(icon));
        }
        assert!("rocket".parse::<ShortcutIcon>().is_err());
        assert_eq!(ShortcutIcon::default(), ShortcutIcon::Gallery);
        assert_eq!(serde_json::to_value(ShortcutIcon::Terminal).unwrap(), json!("terminal"));
    }

    #[test]
    fn parse_input_trims_and_adds_scheme() {
        let input = parse_shortcut_input(&json!({
            "title": "  Grafana ",
            "url": " grafana.local ",
            "icon": "globe",
        }))
        .expect("valid input");

        assert_eq!(input.title, "Grafana");
        assert_eq!(input.url, "https://grafana.local");
        assert_eq!(input.icon, ShortcutIcon::Globe);
    }

    #[test]
    fn parse_input_rejects_bad_shapes() {
        assert!(parse_shortcut_input(&json!([])).is_none());
        assert!(parse_shortcut_input(&json!({"title": "a", "url": "b"})).is_none());
        assert!(parse_shortcut_input(&json!({"title": " ", "url": "b", "icon": "movie"})).is_none());
        assert!(parse_shortcut_input(&json!({"title": "a", "url": 3, "icon": "movie"})).is_none());
        assert!(parse_shortcut_input(&json!({"title": "a", "url": "b", "icon": "rocket"})).is_none());
    }

    #[test]
    fn sanitize_coerces_icon_and_drops_broken_records() {
        let coerced = sanitize_record(&json!({
            "id": "1",
            "title": " NAS ",
            "url": "nas.lan",
            "icon": "rocket",
        }))
        .expect("salvageable");
        assert_eq!(coerced.title, "NAS");
        assert_eq!(coerced.url, "https://nas.lan");
        assert_eq!(coerced.icon, ShortcutIcon::Gallery);

        assert!(sanitize_record(&json!({"id": 1, "title": "a", "url": "b"})).is_none());
        assert!(sanitize_record(&json!({"id": "1", "title": "", "url": "b"})).is_none());
        assert!(sanitize_record(&json!("not an object")).is_none());
    }
}
