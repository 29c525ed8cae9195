use std::sync::LazyLock;

use regex::Regex;

static IOS_DEVICES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"iPad|iPhone|iPod").expect("valid iOS pattern"));

static ANDROID_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Android|webOS|BlackBerry|IEMobile|Opera Mini").expect("valid Android pattern")
});

/// Coarse platform category that decides how images get saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformClass {
    Desktop,
    Ios,
    Android,
}

impl PlatformClass {
    /// Classify a user agent string. iOS tokens win over the Android family.
    pub fn classify(user_agent: &str) -> Self {
        if IOS_DEVICES.is_match(user_agent) {
            PlatformClass::Ios
        } else if ANDROID_FAMILY.is_match(user_agent) {
            PlatformClass::Android
        } else {
            PlatformClass::Desktop
        }
    }

    /// iOS has no file-system save target for programmatic downloads, so the
    /// download control is hidden there.
    pub fn hides_download_control(self) -> bool {
        self == PlatformClass::Ios
    }
}

/// User agent matching the OS this binary was built for.
pub fn host_user_agent() -> &'static str {
    if cfg!(target_os = "android") {
        "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Mobile Safari/537.36"
    } else if cfg!(target_os = "ios") {
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1"
    } else if cfg!(target_os = "macos") {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36"
    } else if cfg!(target_os = "windows") {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36"
    } else {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36"
    }
}
