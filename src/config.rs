use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::debug;
use serde::Deserialize;

use crate::docx::synth::Locale;
use crate::provider::{
    cloudconvert, libreoffice, CloudConvertProvider, DocumentConverter, LibreOfficeProvider,
};
use crate::qr::{parse_ec_level, QrColor, QrOptions};
use crate::salvage::{NormalizeOptions, SalvageLimits, SalvagePipeline};
use crate::shorturl::{self, JsonFileUrlStore, MemoryUrlStore, ShortUrlService, UrlStore};

pub const CONFIG_FILE_NAME: &str = "toolhub.toml";
pub const CONFIG_ENV: &str = "TOOLHUB_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub salvage: SalvageSection,
    #[serde(default)]
    pub convert: ConvertSection,
    #[serde(default)]
    pub shorturl: ShortUrlSection,
    #[serde(default)]
    pub qrcode: QrSection,

    /// Directory of the loaded file; relative paths in the config resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct SalvageSection {
    #[serde(default)]
    pub max_input_bytes: Option<u64>,
    /// Text-bearing members larger than this are truncated before scanning.
    #[serde(default)]
    pub max_entry_scan_bytes: Option<u64>,
    #[serde(default)]
    pub max_total_bytes: Option<u64>,
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub max_nested_depth: Option<usize>,
    #[serde(default)]
    pub merge_max_chars: Option<usize>,
    /// Language of the placeholder body: "zh" or "en".
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConvertSection {
    /// Providers tried in order before salvage. Empty means salvage only.
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub libreoffice: LibreOfficeSection,
    #[serde(default)]
    pub cloudconvert: CloudConvertSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LibreOfficeSection {
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CloudConvertSection {
    /// Name of the environment variable holding the API key. The key itself never lives here.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub sync_api_base: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ShortUrlSection {
    /// "json" (default) or "memory".
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    #[serde(default)]
    pub code_len: Option<usize>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QrSection {
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub margin: Option<u32>,
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub dark: Option<String>,
    #[serde(default)]
    pub light: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join(filename);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// `--config`, then `$TOOLHUB_CONFIG`, then the usual search.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(p));
    }
    find_default_config(CONFIG_FILE_NAME)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let mut cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parse config toml: {}", path.display()))?;
    cfg.base_dir = path.parent().map(Path::to_path_buf);
    Ok(cfg)
}

/// Load the resolved config file, or fall back to built-in defaults when there is none.
pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            debug!("using config {}", path.display());
            load_config(&path)
        }
        None => {
            debug!("no {CONFIG_FILE_NAME} found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

impl AppConfig {
    fn resolve_path(&self, p: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if p.is_relative() => base.join(p),
            _ => p.to_path_buf(),
        }
    }

    pub fn salvage_limits(&self) -> SalvageLimits {
        let s = &self.salvage;
        let d = SalvageLimits::default();
        SalvageLimits {
            max_input_bytes: s.max_input_bytes.unwrap_or(d.max_input_bytes),
            max_entry_scan_bytes: s.max_entry_scan_bytes.unwrap_or(d.max_entry_scan_bytes),
            max_total_bytes: s.max_total_bytes.unwrap_or(d.max_total_bytes),
            max_entries: s.max_entries.unwrap_or(d.max_entries),
            max_nested_depth: s.max_nested_depth.unwrap_or(d.max_nested_depth),
        }
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        let d = NormalizeOptions::default();
        NormalizeOptions {
            merge_max_chars: self.salvage.merge_max_chars.unwrap_or(d.merge_max_chars),
        }
    }

    pub fn locale(&self) -> anyhow::Result<Locale> {
        match self.salvage.locale.as_deref() {
            None => Ok(Locale::default()),
            Some(s) => Locale::parse(s).ok_or_else(|| anyhow!("unknown salvage.locale: {s:?}")),
        }
    }

    pub fn salvage_pipeline(&self) -> anyhow::Result<SalvagePipeline> {
        Ok(SalvagePipeline::new(
            self.salvage_limits(),
            self.normalize_options(),
            self.locale()?,
        ))
    }

    /// Salvage pipeline plus the configured providers, in configured order.
    pub fn converter(&self) -> anyhow::Result<DocumentConverter> {
        let mut conv = DocumentConverter::new(self.salvage_pipeline()?);
        for name in &self.convert.providers {
            conv = match name.trim().to_ascii_lowercase().as_str() {
                "libreoffice" | "soffice" => {
                    let binary = self
                        .convert
                        .libreoffice
                        .binary
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(libreoffice::DEFAULT_BINARY));
                    conv.with_provider(Box::new(LibreOfficeProvider::new(binary)))
                }
                "cloudconvert" => {
                    let cc = &self.convert.cloudconvert;
                    let key_env = cc
                        .api_key_env
                        .as_deref()
                        .unwrap_or(cloudconvert::DEFAULT_API_KEY_ENV);
                    let provider = CloudConvertProvider::from_env(key_env)
                        .with_endpoints(
                            cc.api_base.as_deref().unwrap_or(cloudconvert::DEFAULT_API_BASE),
                            cc.sync_api_base
                                .as_deref()
                                .unwrap_or(cloudconvert::DEFAULT_SYNC_API_BASE),
                        )
                        .with_timeout(Duration::from_secs(
                            cc.timeout_secs.unwrap_or(cloudconvert::DEFAULT_TIMEOUT_SECS),
                        ));
                    conv.with_provider(Box::new(provider))
                }
                other => return Err(anyhow!("unknown conversion provider: {other:?}")),
            };
        }
        Ok(conv)
    }

    pub fn url_data_file(&self) -> PathBuf {
        let p = self
            .shorturl
            .data_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(shorturl::json_file::DEFAULT_DATA_FILE));
        self.resolve_path(&p)
    }

    pub fn url_store(&self) -> anyhow::Result<Box<dyn UrlStore>> {
        match self.shorturl.backend.as_deref().unwrap_or("json") {
            "json" => Ok(Box::new(JsonFileUrlStore::new(self.url_data_file()))),
            "memory" => Ok(Box::new(MemoryUrlStore::new())),
            other => Err(anyhow!("unknown shorturl.backend: {other:?}")),
        }
    }

    pub fn url_service(&self) -> anyhow::Result<ShortUrlService<Box<dyn UrlStore>>> {
        Ok(ShortUrlService::new(
            self.url_store()?,
            self.shorturl.code_len.unwrap_or(shorturl::DEFAULT_CODE_LEN),
            self.shorturl
                .base_url
                .as_deref()
                .unwrap_or(shorturl::DEFAULT_BASE_URL),
        ))
    }

    pub fn qr_options(&self) -> anyhow::Result<QrOptions> {
        let q = &self.qrcode;
        let mut opts = QrOptions::default();
        if let Some(size) = q.size {
            opts.size = size;
        }
        if let Some(margin) = q.margin {
            opts.margin = margin;
        }
        if let Some(level) = q.error_correction.as_deref() {
            opts.level = parse_ec_level(level).context("qrcode.error_correction")?;
        }
        if let Some(dark) = q.dark.as_deref() {
            opts.dark = QrColor::parse(dark).context("qrcode.dark")?;
        }
        if let Some(light) = q.light.as_deref() {
            opts.light = QrColor::parse(light).context("qrcode.light")?;
        }
        opts.validate().context("qrcode.size")?;
        Ok(opts)
    }
}

/// Write a commented `toolhub.toml` into `dir`. An existing file is kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r##"[salvage]
max_input_bytes = 104857600      # 100 MiB
max_entry_scan_bytes = 8388608   # text members are truncated to this before scanning
max_total_bytes = 268435456      # all decompressed payloads of one request
max_entries = 10000
max_nested_depth = 2
merge_max_chars = 20             # 0 disables merging of short fragments
locale = "zh"                    # placeholder language: "zh" or "en"

[convert]
# Tried in order before text salvage. Leave empty to always salvage.
providers = []
# providers = ["libreoffice", "cloudconvert"]

[convert.libreoffice]
binary = "soffice"

[convert.cloudconvert]
api_key_env = "CLOUDCONVERT_API_KEY"
# api_base = "https://api.cloudconvert.com/v2"
# sync_api_base = "https://sync.api.cloudconvert.com/v2"
timeout_secs = 300

[shorturl]
backend = "json"                 # "json" or "memory"
data_file = "data/urls.json"     # relative to this file
code_len = 6
base_url = "http://localhost:3000"

[qrcode]
size = 300
margin = 2
error_correction = "M"           # L, M, Q or H
dark = "#000000"
light = "#ffffff"
"##;
