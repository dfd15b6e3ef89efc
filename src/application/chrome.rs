use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::domain::accounts::Operator;
use crate::presentation::views::LayoutChrome;

/// Page chrome shared by every template: site title, a rotating motto and
/// the signed-in operator.
#[derive(Clone)]
pub struct ChromeService {
    site_title: Arc<str>,
    mottos: Arc<[String]>,
}

impl ChromeService {
    pub fn new(site_title: &str, mottos: Vec<String>) -> Self {
        Self {
            site_title: Arc::from(site_title),
            mottos: Arc::from(mottos),
        }
    }

    pub fn load(&self, operator: Option<&Operator>) -> LayoutChrome {
        LayoutChrome {
            site_title: self.site_title.to_string(),
            motto: self.pick_motto().map(str::to_string),
            operator: operator.map(|operator| operator.username.clone()),
        }
    }

    fn pick_motto(&self) -> Option<&str> {
        self.mottos
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motto_comes_from_the_configured_list() {
        let mottos = vec!["one".to_string(), "two".to_string()];
        let chrome = ChromeService::new("geeoh", mottos.clone());
        for _ in 0..16 {
            let layout = chrome.load(None);
            assert!(mottos.contains(&layout.motto.expect("motto")));
            assert_eq!(layout.site_title, "geeoh");
        }
    }

    #[test]
    fn empty_motto_list_renders_without_one() {
        let chrome = ChromeService::new("geeoh", Vec::new());
        let operator = Operator {
            id: 1,
            username: "ops".into(),
        };
        let layout = chrome.load(Some(&operator));
        assert!(layout.motto.is_none());
        assert_eq!(layout.operator.as_deref(), Some("ops"));
    }
}
