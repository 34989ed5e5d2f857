//! Browser fingerprint randomization.
//!
//! Generates a synthetic browser identity per session so probes present a
//! plausible client to the engines they scrape. Browser, version, and OS are
//! derived from the sampled user-agent string and therefore never contradict
//! it; the remaining attributes are sampled independently.

use rand::seq::SliceRandom;
use rand::Rng;

/// Feature switches a real browser would report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserFeatures {
    pub webgl: bool,
    pub canvas: bool,
    pub webrtc: bool,
    pub audio: bool,
    pub video: bool,
    pub pdf: bool,
    pub flash: bool,
    pub java: bool,
}

impl Default for BrowserFeatures {
    fn default() -> Self {
        Self {
            webgl: true,
            canvas: true,
            webrtc: true,
            audio: true,
            video: true,
            pdf: true,
            flash: false,
            java: false,
        }
    }
}

/// A complete synthetic browser identity.
///
/// `browser`, `browser_version`, `os`, and `os_version` are parsed from
/// `user_agent`; everything else is independently randomized and may be
/// implausible in combination.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub screen_resolution: (u16, u16),
    pub color_depth: u8,
    pub platform: String,
    pub timezone_offset: i8,
    pub language: String,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub features: BrowserFeatures,
    pub plugins: Vec<String>,
    pub fonts: Vec<String>,
    pub hardware_concurrency: u8,
    pub device_memory: u8,
    pub touch_support: bool,
}

impl Fingerprint {
    /// Request headers a direct-HTTP probe should send for this identity.
    ///
    /// `accept-encoding` is deliberately absent: the HTTP client negotiates
    /// compression itself and overriding it disables transparent
    /// decompression.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user-agent", self.user_agent.clone()),
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                    .to_string(),
            ),
            (
                "accept-language",
                format!("{},en;q=0.5", self.language),
            ),
            ("dnt", "1".to_string()),
            ("upgrade-insecure-requests", "1".to_string()),
            ("sec-fetch-dest", "document".to_string()),
            ("sec-fetch-mode", "navigate".to_string()),
            ("sec-fetch-site", "none".to_string()),
            ("sec-fetch-user", "?1".to_string()),
            ("cache-control", "max-age=0".to_string()),
        ]
    }
}

struct UserAgentInfo {
    browser: &'static str,
    version: String,
    os: &'static str,
    os_version: &'static str,
}

const USER_AGENTS: &[&str] = &[
    // Windows Chrome
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    // Windows Edge
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/119.0.0.0 Safari/537.36",
    // Windows Firefox
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:119.0) Gecko/20100101 Firefox/119.0",
    // macOS Safari
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

const SCREEN_RESOLUTIONS: &[(u16, u16)] = &[
    (1920, 1080),
    (1366, 768),
    (1440, 900),
    (1536, 864),
    (2560, 1440),
    (3840, 2160),
];

const COLOR_DEPTHS: &[u8] = &[24, 32];
const PLATFORMS: &[&str] = &["Win32", "MacIntel", "Linux x86_64"];
const LANGUAGES: &[&str] = &["en-US", "en-GB", "en-CA", "en-AU", "en-NZ"];
const HARDWARE_CONCURRENCY: &[u8] = &[2, 4, 6, 8, 12, 16];
const DEVICE_MEMORY: &[u8] = &[4, 8, 16, 32];

const WEBGL_VENDORS: &[&str] = &[
    "Google Inc. (NVIDIA)",
    "Google Inc. (Intel)",
    "Google Inc. (AMD)",
    "Intel Inc.",
    "NVIDIA Corporation",
    "AMD",
];

const WEBGL_RENDERERS: &[&str] = &[
    "ANGLE (NVIDIA, NVIDIA GeForce RTX 3080 Direct3D11 vs_5_0 ps_5_0)",
    "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0)",
    "ANGLE (AMD, AMD Radeon RX 6800 XT Direct3D11 vs_5_0 ps_5_0)",
    "ANGLE (NVIDIA, NVIDIA GeForce GTX 1660 Ti Direct3D11 vs_5_0 ps_5_0)",
    "ANGLE (Intel, Intel(R) Iris(R) Xe Graphics Direct3D11 vs_5_0 ps_5_0)",
    "ANGLE (AMD, AMD Radeon RX 6600 XT Direct3D11 vs_5_0 ps_5_0)",
];

const COMMON_PLUGINS: &[&str] = &[
    "PDF Viewer",
    "Chrome PDF Viewer",
    "Chromium PDF Viewer",
    "Microsoft Edge PDF Viewer",
    "WebKit built-in PDF",
];

const COMMON_FONTS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Times",
    "Courier New",
    "Courier",
    "Verdana",
    "Georgia",
    "Palatino",
    "Garamond",
    "Bookman",
    "Comic Sans MS",
    "Trebuchet MS",
    "Arial Black",
    "Impact",
];

/// Generates [`Fingerprint`]s from curated attribute pools.
#[derive(Debug, Default)]
pub struct FingerprintRandomizer;

impl FingerprintRandomizer {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh identity. Cheap enough to call once per request.
    pub fn generate(&self) -> Fingerprint {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let info = parse_user_agent(user_agent);

        Fingerprint {
            user_agent: user_agent.to_string(),
            screen_resolution: SCREEN_RESOLUTIONS.choose(&mut rng).copied().unwrap_or((1920, 1080)),
            color_depth: COLOR_DEPTHS.choose(&mut rng).copied().unwrap_or(24),
            platform: PLATFORMS.choose(&mut rng).copied().unwrap_or("Win32").to_string(),
            timezone_offset: rng.gen_range(-12..=12),
            language: LANGUAGES.choose(&mut rng).copied().unwrap_or("en-US").to_string(),
            webgl_vendor: WEBGL_VENDORS.choose(&mut rng).copied().unwrap_or("Intel Inc.").to_string(),
            webgl_renderer: WEBGL_RENDERERS
                .choose(&mut rng)
                .copied()
                .unwrap_or(WEBGL_RENDERERS[0])
                .to_string(),
            browser: info.browser.to_string(),
            browser_version: info.version,
            os: info.os.to_string(),
            os_version: info.os_version.to_string(),
            features: BrowserFeatures::default(),
            plugins: random_plugins(&mut rng, info.browser),
            fonts: random_fonts(&mut rng),
            hardware_concurrency: HARDWARE_CONCURRENCY.choose(&mut rng).copied().unwrap_or(4),
            device_memory: DEVICE_MEMORY.choose(&mut rng).copied().unwrap_or(8),
            touch_support: rng.gen_bool(0.5),
        }
    }
}

fn parse_user_agent(user_agent: &str) -> UserAgentInfo {
    let mut browser = "Chrome";
    let mut version = version_after(user_agent, "Chrome/").unwrap_or_else(|| "120.0.0.0".to_string());

    if user_agent.contains("Firefox") {
        browser = "Firefox";
        version = version_after(user_agent, "Firefox/").unwrap_or(version);
    } else if user_agent.contains("Edge") {
        browser = "Edge";
        version = version_after(user_agent, "Edge/").unwrap_or(version);
    } else if user_agent.contains("Safari") && !user_agent.contains("Chrome") {
        browser = "Safari";
        version = version_after(user_agent, "Version/").unwrap_or(version);
    }

    let (os, os_version) = if user_agent.contains("Macintosh") {
        ("MacOS", "10.15")
    } else if user_agent.contains("Linux") {
        ("Linux", "x86_64")
    } else {
        ("Windows", "10")
    };

    UserAgentInfo {
        browser,
        version,
        os,
        os_version,
    }
}

fn version_after(user_agent: &str, marker: &str) -> Option<String> {
    user_agent
        .split(marker)
        .nth(1)?
        .split_whitespace()
        .next()
        .map(|token| token.to_string())
}

fn random_plugins(rng: &mut impl Rng, browser: &str) -> Vec<String> {
    let specific: &[&str] = match browser {
        "Chrome" => &["Chrome PDF Plugin", "Chrome PDF Viewer", "Native Client"],
        "Firefox" => &["PDF Viewer", "OpenH264 Video Codec", "WebGL"],
        "Edge" => &[
            "Microsoft Edge PDF Plugin",
            "Microsoft Edge PDF Viewer",
            "Native Client",
        ],
        "Safari" => &["WebKit built-in PDF", "QuickTime Plug-in", "WebGL"],
        _ => &[],
    };

    let pool: Vec<&str> = COMMON_PLUGINS.iter().chain(specific.iter()).copied().collect();
    let amount = rng.gen_range(3..=pool.len());
    pool.choose_multiple(rng, amount)
        .map(|plugin| plugin.to_string())
        .collect()
}

fn random_fonts(rng: &mut impl Rng) -> Vec<String> {
    let amount = rng.gen_range(8..=COMMON_FONTS.len());
    COMMON_FONTS
        .choose_multiple(rng, amount)
        .map(|font| font.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_and_os_match_user_agent() {
        let randomizer = FingerprintRandomizer::new();
        for _ in 0..50 {
            let fp = randomizer.generate();
            match fp.browser.as_str() {
                "Firefox" => assert!(fp.user_agent.contains("Firefox")),
                "Edge" => assert!(fp.user_agent.contains("Edge")),
                "Safari" => {
                    assert!(fp.user_agent.contains("Safari"));
                    assert!(!fp.user_agent.contains("Chrome"));
                }
                "Chrome" => assert!(fp.user_agent.contains("Chrome")),
                other => panic!("unexpected browser {other}"),
            }
            match fp.os.as_str() {
                "MacOS" => assert!(fp.user_agent.contains("Macintosh")),
                "Linux" => assert!(fp.user_agent.contains("Linux")),
                "Windows" => assert!(fp.user_agent.contains("Windows")),
                other => panic!("unexpected os {other}"),
            }
        }
    }

    #[test]
    fn parses_firefox_version() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
        );
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.version, "120.0");
        assert_eq!(info.os, "Windows");
    }

    #[test]
    fn safari_is_not_confused_with_chrome() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        );
        assert_eq!(info.browser, "Chrome");
    }

    #[test]
    fn attribute_pools_respect_bounds() {
        let randomizer = FingerprintRandomizer::new();
        for _ in 0..20 {
            let fp = randomizer.generate();
            assert!(fp.plugins.len() >= 3);
            assert!(fp.fonts.len() >= 8);
            assert!((-12..=12).contains(&fp.timezone_offset));
        }
    }

    #[test]
    fn headers_carry_the_identity() {
        let fp = FingerprintRandomizer::new().generate();
        let headers = fp.headers();
        let ua = headers.iter().find(|(name, _)| *name == "user-agent").unwrap();
        assert_eq!(ua.1, fp.user_agent);
        assert!(!headers.iter().any(|(name, _)| *name == "accept-encoding"));
    }
}
