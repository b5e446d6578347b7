use std::path::PathBuf;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Runtime settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP bridge
    pub addr: String,
    /// Directory every converted PDF is written into
    pub output_dir: PathBuf,
    /// Chromium executable used as the rendering engine
    pub chrome_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("PDFPRESS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let output_dir = lookup("PDFPRESS_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("pdfpress"));
        let chrome_path = lookup("CHROME_PATH").unwrap_or_else(default_chrome_path);

        Self {
            addr,
            output_dir,
            chrome_path,
        }
    }
}

fn default_chrome_path() -> String {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".to_string()
    } else if cfg!(target_os = "windows") {
        r"C:\Program Files\Google\Chrome\Application\chrome.exe".to_string()
    } else {
        for path in &["/usr/bin/chromium", "/usr/bin/chromium-browser", "/usr/bin/google-chrome"] {
            if std::path::Path::new(path).exists() {
                return path.to_string();
            }
        }
        "chromium".to_string()
    }
}
