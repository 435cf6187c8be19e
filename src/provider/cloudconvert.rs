use std::time::Duration;

use log::debug;
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

use super::ConversionProvider;

pub const DEFAULT_API_KEY_ENV: &str = "CLOUDCONVERT_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://api.cloudconvert.com/v2";
pub const DEFAULT_SYNC_API_BASE: &str = "https://sync.api.cloudconvert.com/v2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const NAME: &str = "cloudconvert";
const UPLOAD_TASK: &str = "upload-file";
const EXPORT_TASK: &str = "export-file";

/// Hosted conversion: create a job, upload the file, wait, download the export.
pub struct CloudConvertProvider {
    api_key: Option<String>,
    api_base: String,
    sync_api_base: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    data: Job,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: String,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Task {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    result: Option<TaskResult>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskResult {
    #[serde(default)]
    form: Option<UploadForm>,
    #[serde(default)]
    files: Vec<ExportFile>,
}

#[derive(Debug, Deserialize)]
struct UploadForm {
    url: String,
    #[serde(default)]
    parameters: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    url: Option<String>,
}

impl Job {
    fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    fn upload_form(&self) -> Option<&UploadForm> {
        self.task(UPLOAD_TASK)?.result.as_ref()?.form.as_ref()
    }

    fn export_url(&self) -> Option<&str> {
        let task = self.task(EXPORT_TASK)?;
        if task.status != "finished" {
            return None;
        }
        task.result.as_ref()?.files.first()?.url.as_deref()
    }
}

/// Three chained tasks: upload, pages → docx, export to a download URL.
fn job_request() -> Value {
    json!({
        "tasks": {
            UPLOAD_TASK: { "operation": "import/upload" },
            "convert-file": {
                "operation": "convert",
                "input": [UPLOAD_TASK],
                "input_format": "pages",
                "output_format": "docx"
            },
            EXPORT_TASK: {
                "operation": "export/url",
                "input": ["convert-file"]
            }
        }
    })
}

fn form_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CloudConvertProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_base: DEFAULT_API_BASE.to_string(),
            sync_api_base: DEFAULT_SYNC_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Key read from the named environment variable; absent or empty leaves the provider unavailable.
    pub fn from_env(api_key_env: &str) -> Self {
        Self::new(std::env::var(api_key_env).ok())
    }

    pub fn with_endpoints(mut self, api_base: &str, sync_api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.sync_api_base = sync_api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn http_err(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::provider(NAME, format!("request timed out: {e}"))
        } else {
            Error::provider(NAME, e.to_string())
        }
    }

    fn parse_job(resp: reqwest::blocking::Response, step: &str) -> Result<Job> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::provider(NAME, format!("{step}: HTTP {status}: {body}")));
        }
        let envelope: JobEnvelope = resp
            .json()
            .map_err(|e| Error::provider(NAME, format!("{step}: bad response: {e}")))?;
        Ok(envelope.data)
    }
}

impl ConversionProvider for CloudConvertProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn convert(&self, input: &[u8], file_name: &str) -> Result<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::provider(NAME, "API key not configured"))?;
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Self::http_err)?;

        let resp = client
            .post(format!("{}/jobs", self.api_base))
            .bearer_auth(api_key)
            .json(&job_request())
            .send()
            .map_err(Self::http_err)?;
        let job = Self::parse_job(resp, "create job")?;
        debug!("cloudconvert job {} created", job.id);

        let form = job
            .upload_form()
            .ok_or_else(|| Error::provider(NAME, "job has no upload form"))?;
        let mut upload = multipart::Form::new();
        for (key, value) in &form.parameters {
            upload = upload.text(key.clone(), form_value(value));
        }
        upload = upload.part(
            "file",
            multipart::Part::bytes(input.to_vec()).file_name(file_name.to_string()),
        );
        let resp = client
            .post(&form.url)
            .multipart(upload)
            .send()
            .map_err(Self::http_err)?;
        if !resp.status().is_success() {
            return Err(Error::provider(
                NAME,
                format!("upload failed: HTTP {}", resp.status()),
            ));
        }

        let resp = client
            .get(format!("{}/jobs/{}", self.sync_api_base, job.id))
            .bearer_auth(api_key)
            .send()
            .map_err(Self::http_err)?;
        let done = Self::parse_job(resp, "wait for job")?;
        let url = done
            .export_url()
            .ok_or_else(|| Error::provider(NAME, "export task did not finish"))?;

        let resp = client.get(url).send().map_err(Self::http_err)?;
        if !resp.status().is_success() {
            return Err(Error::provider(
                NAME,
                format!("download failed: HTTP {}", resp.status()),
            ));
        }
        let bytes = resp.bytes().map_err(Self::http_err)?;
        debug!("cloudconvert job {} returned {} bytes", job.id, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_without_key() {
        assert!(!CloudConvertProvider::new(None).is_available());
        assert!(!CloudConvertProvider::new(Some("  ".to_string())).is_available());
        assert!(CloudConvertProvider::new(Some("k".to_string())).is_available());
        assert!(CloudConvertProvider::new(None).convert(b"x", "a.pages").is_err());
    }

    #[test]
    fn job_chains_upload_convert_export() {
        let req = job_request();
        assert_eq!(req["tasks"]["upload-file"]["operation"], "import/upload");
        assert_eq!(req["tasks"]["convert-file"]["input_format"], "pages");
        assert_eq!(req["tasks"]["convert-file"]["output_format"], "docx");
        assert_eq!(req["tasks"]["export-file"]["input"][0], "convert-file");
    }

    #[test]
    fn reads_upload_form_and_export_url() {
        let created: JobEnvelope = serde_json::from_value(json!({
            "data": {
                "id": "job-1",
                "tasks": [
                    { "name": "upload-file", "status": "waiting",
                      "result": { "form": { "url": "https://upload.example/x",
                                            "parameters": { "expires": 123, "signature": "abc" } } } },
                    { "name": "export-file", "status": "waiting" }
                ]
            }
        }))
        .expect("parse");
        let form = created.data.upload_form().expect("form");
        assert_eq!(form.url, "https://upload.example/x");
        assert_eq!(form_value(&form.parameters["expires"]), "123");
        assert_eq!(form_value(&form.parameters["signature"]), "abc");
        assert_eq!(created.data.export_url(), None);

        let finished: JobEnvelope = serde_json::from_value(json!({
            "data": {
                "id": "job-1",
                "tasks": [
                    { "name": "export-file", "status": "finished",
                      "result": { "files": [ { "url": "https://dl.example/a.docx" } ] } }
                ]
            }
        }))
        .expect("parse");
        assert_eq!(finished.data.export_url(), Some("https://dl.example/a.docx"));
    }
}
