use std::time::Duration;

use pawtrait_contracts::entities::{
    GenerationJob, GenerationRequest, JobStatus, SourceImage, UploadHandle,
};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Map, Value};

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::retry::send_with_retries;
use crate::{push_unique_warning, response_json_or_error, truncate_text};

/// ControlNet preprocessor the provider uses for style-reference guidance.
pub const STYLE_REFERENCE_PREPROCESSOR_ID: u64 = 67;

/// Image handed back by `download_image`.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Result of the pre-signed upload flow. The binary transfer is advisory;
/// a reserved id can come back with `transferred: false` when the direct
/// POST failed.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub handle: UploadHandle,
    pub transferred: bool,
}

/// Driver for the image-generation provider: upload, submit, poll fetch.
pub trait GenerationService: Send + Sync {
    fn upload_image(
        &self,
        image: &SourceImage,
        warnings: &mut Vec<String>,
    ) -> Result<UploadOutcome, PipelineError>;

    fn submit(
        &self,
        request: &GenerationRequest,
        warnings: &mut Vec<String>,
    ) -> Result<String, PipelineError>;

    fn fetch_job(&self, generation_id: &str) -> Result<GenerationJob, PipelineError>;
}

/// Pre-signed upload target issued by the provider.
#[derive(Debug, Clone, PartialEq)]
struct UploadSlot {
    id: String,
    url: String,
    fields: Map<String, Value>,
}

pub struct GenerationClient {
    config: GenerationConfig,
    http: HttpClient,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    fn api_key(&self) -> Result<&str, PipelineError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential("LEONARDO_API_KEY"))
    }

    fn init_image_endpoint(&self) -> String {
        format!("{}/init-image", self.config.api_base)
    }

    fn generations_endpoint(&self) -> String {
        format!("{}/generations", self.config.api_base)
    }

    fn generation_endpoint(&self, generation_id: &str) -> String {
        format!("{}/generations/{}", self.config.api_base, generation_id)
    }

    fn create_upload_slot(
        &self,
        extension: &str,
        warnings: &mut Vec<String>,
    ) -> Result<UploadSlot, PipelineError> {
        let api_key = self.api_key()?;
        let endpoint = self.init_image_endpoint();
        let payload = json!({"extension": extension});
        let response = send_with_retries(&self.config.retry, "init image", warnings, |_| {
            let response = self
                .http
                .post(&endpoint)
                .bearer_auth(api_key)
                .timeout(self.config.request_timeout)
                .json(&payload)
                .send()?;
            response_json_or_error(response)
        })?;
        parse_upload_slot(&response)
    }

    /// Direct POST of the binary to the pre-signed URL. The slot id is
    /// already reserved provider-side, so a failure here degrades the run
    /// instead of aborting it.
    fn transfer_to_slot(
        &self,
        slot: &UploadSlot,
        image: &SourceImage,
        warnings: &mut Vec<String>,
    ) -> bool {
        let mut form = MultipartForm::new();
        for (key, value) in &slot.fields {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }

        let file_name = format!("pet.{}", image.extension());
        let part = match MultipartPart::bytes(image.bytes.clone())
            .file_name(file_name)
            .mime_str(&image.mime_type)
        {
            Ok(part) => part,
            Err(err) => {
                push_unique_warning(
                    warnings,
                    format!("init image transfer degraded: invalid mime ({err}); continuing with reserved id."),
                );
                return false;
            }
        };
        form = form.part("file", part);

        // The URL is pre-signed; no authorization header.
        let outcome = self
            .http
            .post(&slot.url)
            .timeout(self.config.upload_timeout)
            .multipart(form)
            .send();
        match outcome {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                let code = response.status().as_u16();
                push_unique_warning(
                    warnings,
                    format!("init image transfer degraded ({code}); continuing with reserved id."),
                );
                false
            }
            Err(err) => {
                push_unique_warning(
                    warnings,
                    format!("init image transfer degraded: {err}; continuing with reserved id."),
                );
                false
            }
        }
    }

    fn generation_payload(&self, request: &GenerationRequest) -> Value {
        let model_id = if request.fast_mode {
            &self.config.fast_model_id
        } else {
            &self.config.model_id
        };
        let mut payload = Map::new();
        payload.insert("modelId".to_string(), Value::String(model_id.clone()));
        payload.insert("prompt".to_string(), Value::String(request.prompt.clone()));
        payload.insert("width".to_string(), Value::Number(request.width.into()));
        payload.insert("height".to_string(), Value::Number(request.height.into()));
        payload.insert("num_images".to_string(), Value::Number(1.into()));
        payload.insert(
            "init_image_id".to_string(),
            Value::String(request.init_image_id.clone()),
        );
        payload.insert("init_strength".to_string(), json!(request.init_strength));
        payload.insert("alchemy".to_string(), Value::Bool(!request.fast_mode));
        if !request.elements.is_empty() {
            payload.insert(
                "elements".to_string(),
                Value::Array(
                    request
                        .elements
                        .iter()
                        .map(|element| {
                            json!({"akUUID": element.ak_uuid, "weight": element.weight})
                        })
                        .collect(),
                ),
            );
        }
        if let Some(reference_id) = request.style_reference_id.as_deref() {
            payload.insert(
                "controlnets".to_string(),
                Value::Array(vec![json!({
                    "initImageId": reference_id,
                    "initImageType": "UPLOADED",
                    "preprocessorId": STYLE_REFERENCE_PREPROCESSOR_ID,
                    "strengthType": "Mid",
                })]),
            );
        }
        Value::Object(payload)
    }
}

impl GenerationService for GenerationClient {
    fn upload_image(
        &self,
        image: &SourceImage,
        warnings: &mut Vec<String>,
    ) -> Result<UploadOutcome, PipelineError> {
        let slot = self.create_upload_slot(image.extension(), warnings)?;
        let transferred = self.transfer_to_slot(&slot, image, warnings);
        Ok(UploadOutcome {
            handle: UploadHandle {
                id: slot.id,
                mime_type: image.mime_type.clone(),
            },
            transferred,
        })
    }

    fn submit(
        &self,
        request: &GenerationRequest,
        warnings: &mut Vec<String>,
    ) -> Result<String, PipelineError> {
        let api_key = self.api_key()?;
        let endpoint = self.generations_endpoint();
        let payload = self.generation_payload(request);
        let response = send_with_retries(&self.config.retry, "generation submit", warnings, |_| {
            let response = self
                .http
                .post(&endpoint)
                .bearer_auth(api_key)
                .timeout(self.config.request_timeout)
                .json(&payload)
                .send()?;
            response_json_or_error(response)
        })?;
        extract_generation_id(&response).ok_or_else(|| {
            PipelineError::MalformedResponse(
                "generation response carries no generation id".to_string(),
            )
        })
    }

    fn fetch_job(&self, generation_id: &str) -> Result<GenerationJob, PipelineError> {
        let api_key = self.api_key()?;
        let response = self
            .http
            .get(self.generation_endpoint(generation_id))
            .bearer_auth(api_key)
            .timeout(self.config.request_timeout)
            .send()?;
        let payload = response_json_or_error(response)?;
        Ok(parse_generation_job(generation_id, &payload))
    }
}

/// Fetches a finished result image over plain GET.
pub fn download_image(url: &str, timeout: Duration) -> Result<DownloadedImage, PipelineError> {
    let http = HttpClient::new();
    let response = http.get(url).timeout(timeout).send()?;
    let status = response.status();
    if !status.is_success() {
        let code = status.as_u16();
        let body = response.text().unwrap_or_default();
        return Err(PipelineError::provider(code, truncate_text(&body, 512)));
    }
    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes()?.to_vec();
    Ok(DownloadedImage { bytes, mime_type })
}

fn parse_upload_slot(payload: &Value) -> Result<UploadSlot, PipelineError> {
    let container = find_object_with_key(payload, &["url", "uploadUrl", "upload_url"])
        .ok_or_else(|| {
            PipelineError::MalformedResponse("init-image response carries no upload url".to_string())
        })?;
    let id = string_field(container, &["id", "uploadId", "upload_id"]).ok_or_else(|| {
        PipelineError::MalformedResponse("init-image response carries no id".to_string())
    })?;
    let url = string_field(container, &["url", "uploadUrl", "upload_url"]).ok_or_else(|| {
        PipelineError::MalformedResponse("init-image response carries no upload url".to_string())
    })?;
    let fields = match container.get("fields").or_else(|| container.get("formFields")) {
        Some(Value::Object(map)) => map.clone(),
        // Some responses JSON-encode the pre-signed fields as a string.
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|parsed| parsed.as_object().cloned())
            .unwrap_or_default(),
        _ => Map::new(),
    };
    Ok(UploadSlot { id, url, fields })
}

fn extract_generation_id(payload: &Value) -> Option<String> {
    let container = find_object_with_key(payload, &["generationId", "generation_id"])?;
    string_field(container, &["generationId", "generation_id"])
}

fn parse_generation_job(generation_id: &str, payload: &Value) -> GenerationJob {
    let container = find_object_with_key(payload, &["status", "generatedImages", "generated_images"]);
    let status = container
        .and_then(|object| object.get("status"))
        .and_then(Value::as_str)
        .map(JobStatus::from_provider)
        .unwrap_or(JobStatus::Pending);
    let result_image_url = container
        .and_then(|object| {
            object
                .get("generatedImages")
                .or_else(|| object.get("generated_images"))
        })
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    GenerationJob {
        id: generation_id.to_string(),
        status,
        result_image_url,
    }
}

/// Finds the object holding one of `keys`: the payload itself, or any
/// object nested one level deep (providers wrap responses in a job
/// envelope such as `sdGenerationJob` or `generations_by_pk`).
fn find_object_with_key<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    let direct = payload.as_object()?;
    if keys.iter().any(|key| direct.contains_key(*key)) {
        return Some(direct);
    }
    direct.values().find_map(|value| {
        value
            .as_object()
            .filter(|nested| keys.iter().any(|key| nested.contains_key(*key)))
    })
}

fn string_field(container: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        container
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}
