//! Search engine identities and per-engine query endpoints.

use std::fmt;

/// Engines whose link counts feed the authority score. Only a subset is
/// actively probed; the rest exist so weights and reports can name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Bing,
    DuckDuckGo,
    Google,
    Brave,
    Mojeek,
    Yandex,
    Yahoo,
    Baidu,
}

impl Engine {
    pub const ALL: [Engine; 8] = [
        Engine::Bing,
        Engine::DuckDuckGo,
        Engine::Google,
        Engine::Brave,
        Engine::Mojeek,
        Engine::Yandex,
        Engine::Yahoo,
        Engine::Baidu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Bing => "bing",
            Engine::DuckDuckGo => "duckduckgo",
            Engine::Google => "google",
            Engine::Brave => "brave",
            Engine::Mojeek => "mojeek",
            Engine::Yandex => "yandex",
            Engine::Yahoo => "yahoo",
            Engine::Baidu => "baidu",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to ask one engine for backlink results.
///
/// `search_url` contains a `{query}` placeholder. Count selectors locate an
/// explicit result-count element; result selectors enumerate result entries
/// for the fallback of counting what is visible on the first page.
#[derive(Debug, Clone, Copy)]
pub struct EngineEndpoint {
    pub engine: Engine,
    pub search_url: &'static str,
    pub count_selectors: &'static [&'static str],
    pub result_selectors: &'static [&'static str],
}

impl EngineEndpoint {
    pub fn search_url_for(&self, query: &str) -> String {
        self.search_url.replace("{query}", query)
    }
}

pub static BING: EngineEndpoint = EngineEndpoint {
    engine: Engine::Bing,
    search_url: "https://www.bing.com/search?q={query}",
    count_selectors: &["span.sb_count", ".sb_count"],
    result_selectors: &["li.b_algo", "ol#b_results > li"],
};

pub static DUCKDUCKGO: EngineEndpoint = EngineEndpoint {
    engine: Engine::DuckDuckGo,
    search_url: "https://html.duckduckgo.com/html/?q={query}",
    count_selectors: &[],
    result_selectors: &["div.result", "div.results_links", "article"],
};

pub static GOOGLE: EngineEndpoint = EngineEndpoint {
    engine: Engine::Google,
    search_url: "https://www.google.com/search?q={query}",
    count_selectors: &["#result-stats", "div#resultStats"],
    result_selectors: &["div.g", "div[data-sokoban-container]"],
};

pub static BRAVE: EngineEndpoint = EngineEndpoint {
    engine: Engine::Brave,
    search_url: "https://search.brave.com/search?q={query}",
    count_selectors: &[],
    result_selectors: &["div.snippet", "#results > div"],
};

/// `site:` query restricting results to pages on the given domain.
pub fn site_query(domain: &str) -> String {
    format!("site:{domain}")
}

/// `inurl:` fallback used when an engine rejects `site:` queries.
pub fn inurl_query(domain: &str) -> String {
    format!("inurl:{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_substitutes_query() {
        let url = BING.search_url_for("site:example.com");
        assert_eq!(url, "https://www.bing.com/search?q=site:example.com");
    }

    #[test]
    fn engine_names_are_lowercase() {
        for engine in Engine::ALL {
            assert_eq!(engine.to_string(), engine.as_str());
            assert!(engine.as_str().chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn serde_roundtrip_uses_lowercase_names() {
        let json = serde_json::to_string(&Engine::DuckDuckGo).unwrap();
        assert_eq!(json, "\"duckduckgo\"");
        let engine: Engine = serde_json::from_str("\"bing\"").unwrap();
        assert_eq!(engine, Engine::Bing);
    }
}
