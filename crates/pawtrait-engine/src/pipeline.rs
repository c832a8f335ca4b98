use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pawtrait_contracts::cache::DescriptionCache;
use pawtrait_contracts::entities::{Description, PipelineResult, RunState, SourceImage};
use pawtrait_contracts::events::EventLog;
use pawtrait_contracts::styles::{StyleElementSpec, StyleSpec};
use serde_json::json;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::generation::GenerationService;
use crate::poll::{wait_for_completion, PollPolicy};
use crate::request::{build_generation_request, DimensionLimits, PROMPT_MAX_CHARS};
use crate::vision::VisionService;
use crate::{image_digest, map_object, probe_dimensions, push_unique_warning, truncate_text};

/// Per-run knobs for a stylize pass. Everything is optional; the defaults
/// produce a plain quality-mode restyle of the source photo.
#[derive(Debug, Clone, Default)]
pub struct StylizeOptions {
    pub style: Option<StyleSpec>,
    pub hint: Option<String>,
    pub fast_mode: bool,
    pub init_strength: Option<f64>,
    pub style_reference: Option<SourceImage>,
}

/// End-to-end stylize orchestrator: describe, upload, submit, poll.
///
/// A pipeline drives at most one run at a time; concurrent `run` calls are
/// rejected without disturbing the run already in flight. Descriptions are
/// cached by source-image digest for the lifetime of the pipeline.
pub struct Pipeline {
    vision: Arc<dyn VisionService>,
    generation: Arc<dyn GenerationService>,
    events: EventLog,
    limits: DimensionLimits,
    poll: PollPolicy,
    default_init_strength: f64,
    state: Mutex<RunState>,
    in_flight: AtomicBool,
    descriptions: DescriptionCache,
}

impl Pipeline {
    pub fn new(
        vision: Arc<dyn VisionService>,
        generation: Arc<dyn GenerationService>,
        events: EventLog,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            vision,
            generation,
            events,
            limits: config.limits,
            poll: config.poll,
            default_init_strength: config.default_init_strength,
            state: Mutex::new(RunState::Idle),
            in_flight: AtomicBool::new(false),
            descriptions: DescriptionCache::new(),
        }
    }

    /// Stage the pipeline last reached. Terminal states persist until the
    /// next run starts.
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Standalone description lookup, sharing the run cache: a later
    /// `run` over the same bytes reuses the result.
    pub fn describe(
        &self,
        image: &SourceImage,
        hint: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Result<Description, PipelineError> {
        self.ensure_description(image, hint, warnings)
    }

    /// Runs the full stylize pass. Failures come back inside the result;
    /// the event log carries the step-by-step trail either way.
    pub fn run(&self, image: &SourceImage, options: &StylizeOptions) -> PipelineResult {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return PipelineResult::failed(PipelineError::RunInProgress.to_string(), Vec::new());
        }

        let mut warnings = Vec::new();
        let outcome = self.run_inner(image, options, &mut warnings);
        let result = match outcome {
            Ok(image_url) => {
                self.set_state(RunState::Complete);
                self.record_event("run_finished", map_object(json!({"image_url": image_url})));
                PipelineResult::completed(image_url, warnings)
            }
            Err(err) => {
                self.set_state(RunState::Failed);
                self.record_event("run_failed", map_object(json!({"error": err.to_string()})));
                PipelineResult::failed(err.to_string(), warnings)
            }
        };
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn run_inner(
        &self,
        image: &SourceImage,
        options: &StylizeOptions,
        warnings: &mut Vec<String>,
    ) -> Result<String, PipelineError> {
        self.set_state(RunState::Analyzing);
        self.record_event(
            "run_started",
            map_object(json!({
                "style": options.style.as_ref().map(|style| style.key.as_str()),
                "fast_mode": options.fast_mode,
            })),
        );

        let description = self.ensure_description(image, options.hint.as_deref(), warnings)?;

        self.set_state(RunState::Generating);
        let upload = self.generation.upload_image(image, warnings)?;
        self.record_event(
            "init_image_uploaded",
            map_object(json!({
                "init_image_id": upload.handle.id,
                "transferred": upload.transferred,
            })),
        );
        if !upload.transferred {
            self.record_event(
                "upload_degraded",
                map_object(json!({"init_image_id": upload.handle.id})),
            );
        }

        let style_reference_id = options.style_reference.as_ref().and_then(|reference| {
            match self.generation.upload_image(reference, warnings) {
                Ok(outcome) => Some(outcome.handle.id),
                Err(err) => {
                    push_unique_warning(
                        warnings,
                        format!(
                            "style reference upload failed: {err}; continuing without style reference."
                        ),
                    );
                    self.record_event(
                        "style_reference_skipped",
                        map_object(json!({"reason": err.to_string()})),
                    );
                    None
                }
            }
        });

        let source_dims = probe_dimensions(&image.bytes);
        if source_dims.is_none() {
            push_unique_warning(
                warnings,
                "source dimensions unreadable; using default output size.".to_string(),
            );
        }

        let prompt = compose_prompt(&description, options.style.as_ref());
        let init_strength = options
            .init_strength
            .or_else(|| options.style.as_ref().map(|style| style.init_strength))
            .unwrap_or(self.default_init_strength);
        let style_elements: &[StyleElementSpec] = options
            .style
            .as_ref()
            .map(|style| style.elements.as_slice())
            .unwrap_or(&[]);
        let request = build_generation_request(
            &self.limits,
            &prompt,
            &upload.handle,
            source_dims,
            init_strength,
            style_elements,
            style_reference_id,
            options.fast_mode,
        );

        let generation_id = self.generation.submit(&request, warnings)?;
        self.record_event(
            "generation_submitted",
            map_object(json!({
                "generation_id": generation_id,
                "width": request.width,
                "height": request.height,
                "fast_mode": request.fast_mode,
            })),
        );

        self.set_state(RunState::Polling);
        let job = wait_for_completion(&self.poll, |attempt| {
            let outcome = self.generation.fetch_job(&generation_id);
            let tick = match &outcome {
                Ok(job) => json!({"attempt": attempt, "status": job.status.as_str()}),
                Err(err) => json!({"attempt": attempt, "error": err.to_string()}),
            };
            self.record_event("poll_tick", map_object(tick));
            outcome
        })?;

        job.result_image_url.ok_or_else(|| {
            PipelineError::GenerationFailed("generation completed without an image".to_string())
        })
    }

    fn ensure_description(
        &self,
        image: &SourceImage,
        hint: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Result<Description, PipelineError> {
        let digest = image_digest(&image.bytes);
        if let Some(cached) = self.descriptions.lookup(&digest) {
            self.record_event("description_ready", map_object(json!({"source": "cache"})));
            return Ok(cached);
        }
        let description = self.vision.describe(image, hint, warnings)?;
        self.descriptions.store(&digest, description.clone());
        self.record_event("description_ready", map_object(json!({"source": "vision"})));
        Ok(description)
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn record_event(&self, kind: &str, payload: pawtrait_contracts::events::EventPayload) {
        // The event trail is advisory; a full disk must not fail the run.
        let _ = self.events.record(kind, payload);
    }
}

/// Prompt sent to the generation provider: the English description segment
/// (or the raw reply when no segment was isolated) plus the style suffix.
fn compose_prompt(description: &Description, style: Option<&StyleSpec>) -> String {
    let base = if description.english_text.trim().is_empty() {
        description.raw_text.trim()
    } else {
        description.english_text.trim()
    };
    let mut prompt = base.to_string();
    if let Some(style) = style {
        let suffix = style.prompt_suffix.trim();
        if !suffix.is_empty() {
            if !prompt.is_empty() {
                prompt.push_str(", ");
            }
            prompt.push_str(suffix);
        }
    }
    truncate_text(&prompt, PROMPT_MAX_CHARS)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;
    use std::time::Duration;

    use pawtrait_contracts::entities::{GenerationJob, GenerationRequest, JobStatus, UploadHandle};
    use pawtrait_contracts::styles::StyleRegistry;
    use serde_json::Value;

    use super::*;
    use crate::generation::UploadOutcome;

    struct ScriptedVision {
        calls: AtomicU32,
        fail: bool,
    }

    impl ScriptedVision {
        fn ok() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: true,
            }
        }
    }

    impl VisionService for ScriptedVision {
        fn describe(
            &self,
            _image: &SourceImage,
            _hint: Option<&str>,
            _warnings: &mut Vec<String>,
        ) -> Result<Description, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::provider(500, "vision down"));
            }
            Ok(Description {
                chinese_text: "一只系红色领巾的柯基犬".to_string(),
                english_text: "a corgi with a red bandana".to_string(),
                raw_text: "[Chinese]一只系红色领巾的柯基犬[English]a corgi with a red bandana"
                    .to_string(),
            })
        }
    }

    #[derive(Default)]
    struct ScriptedGeneration {
        statuses: Mutex<VecDeque<JobStatus>>,
        submitted: Mutex<Vec<GenerationRequest>>,
        upload_calls: AtomicU32,
        fail_uploads_after_first: bool,
        degrade_transfer: bool,
        complete_without_url: bool,
    }

    impl ScriptedGeneration {
        fn with_statuses(statuses: &[JobStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn submitted_requests(&self) -> Vec<GenerationRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl GenerationService for ScriptedGeneration {
        fn upload_image(
            &self,
            image: &SourceImage,
            _warnings: &mut Vec<String>,
        ) -> Result<UploadOutcome, PipelineError> {
            let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_uploads_after_first && call > 1 {
                return Err(PipelineError::provider(500, "upload pool exhausted"));
            }
            Ok(UploadOutcome {
                handle: UploadHandle {
                    id: format!("upload-{call}"),
                    mime_type: image.mime_type.clone(),
                },
                transferred: !self.degrade_transfer,
            })
        }

        fn submit(
            &self,
            request: &GenerationRequest,
            _warnings: &mut Vec<String>,
        ) -> Result<String, PipelineError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok("gen-1".to_string())
        }

        fn fetch_job(&self, generation_id: &str) -> Result<GenerationJob, PipelineError> {
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(JobStatus::Complete);
            let result_image_url = (status == JobStatus::Complete && !self.complete_without_url)
                .then(|| "https://cdn.example/pet.png".to_string());
            Ok(GenerationJob {
                id: generation_id.to_string(),
                status,
                result_image_url,
            })
        }
    }

    /// Blocks every poll fetch until the gate channel fires.
    struct GatedGeneration {
        gate: Mutex<Receiver<()>>,
    }

    impl GenerationService for GatedGeneration {
        fn upload_image(
            &self,
            image: &SourceImage,
            _warnings: &mut Vec<String>,
        ) -> Result<UploadOutcome, PipelineError> {
            Ok(UploadOutcome {
                handle: UploadHandle {
                    id: "upload-1".to_string(),
                    mime_type: image.mime_type.clone(),
                },
                transferred: true,
            })
        }

        fn submit(
            &self,
            _request: &GenerationRequest,
            _warnings: &mut Vec<String>,
        ) -> Result<String, PipelineError> {
            Ok("gen-1".to_string())
        }

        fn fetch_job(&self, generation_id: &str) -> Result<GenerationJob, PipelineError> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(GenerationJob {
                id: generation_id.to_string(),
                status: JobStatus::Complete,
                result_image_url: Some("https://cdn.example/pet.png".to_string()),
            })
        }
    }

    fn fast_config() -> GenerationConfig {
        let mut config = GenerationConfig::default();
        config.poll = PollPolicy {
            max_polls: 5,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        };
        config
    }

    fn test_image() -> SourceImage {
        SourceImage::new(b"not a decodable image".to_vec(), "image/png")
    }

    fn event_kinds(path: &std::path::Path) -> Vec<String> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|event| event["event"].as_str().map(str::to_string))
            .collect()
    }

    fn index_of(kinds: &[String], kind: &str) -> usize {
        kinds
            .iter()
            .position(|candidate| candidate == kind)
            .unwrap_or(usize::MAX)
    }

    #[test]
    fn stylize_run_completes_and_logs_event_trail() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let generation = Arc::new(ScriptedGeneration::with_statuses(&[
            JobStatus::Pending,
            JobStatus::Pending,
            JobStatus::Complete,
        ]));
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            Arc::clone(&generation) as Arc<dyn GenerationService>,
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let registry = StyleRegistry::default();
        let options = StylizeOptions {
            style: registry.get("watercolor").cloned(),
            ..StylizeOptions::default()
        };
        let result = pipeline.run(&test_image(), &options);

        assert!(result.success, "run failed: {:?}", result.error);
        assert_eq!(
            result.image_url.as_deref(),
            Some("https://cdn.example/pet.png")
        );
        assert_eq!(pipeline.state(), RunState::Complete);
        assert!(result
            .warnings
            .iter()
            .any(|warning| warning.contains("source dimensions unreadable")));

        let submitted = generation.submitted_requests();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0];
        assert_eq!((request.width, request.height), (1024, 1024));
        assert_eq!(request.init_image_id, "upload-1");
        assert!(!request.fast_mode);
        assert!((request.init_strength - 0.45).abs() < 1e-9);
        assert!(request
            .prompt
            .starts_with("a corgi with a red bandana, delicate watercolor painting"));
        assert_eq!(request.elements.len(), 1);
        // 0.6 snapped onto the 50-step grid between 0.3 and 1.0.
        assert!((request.elements[0].weight - 0.594).abs() < 1e-9);

        let kinds = event_kinds(&events_path);
        assert!(index_of(&kinds, "run_started") < index_of(&kinds, "description_ready"));
        assert!(index_of(&kinds, "description_ready") < index_of(&kinds, "init_image_uploaded"));
        assert!(index_of(&kinds, "init_image_uploaded") < index_of(&kinds, "generation_submitted"));
        assert!(index_of(&kinds, "generation_submitted") < index_of(&kinds, "poll_tick"));
        assert!(index_of(&kinds, "poll_tick") < index_of(&kinds, "run_finished"));
        assert_eq!(kinds.iter().filter(|kind| *kind == "poll_tick").count(), 3);
        assert!(!kinds.iter().any(|kind| kind == "run_failed"));
        Ok(())
    }

    #[test]
    fn failed_generation_reports_provider_failure() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let generation = Arc::new(ScriptedGeneration::with_statuses(&[JobStatus::Failed]));
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            generation,
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let result = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(!result.success);
        assert!(result.error.unwrap_or_default().contains("as failed"));
        assert_eq!(pipeline.state(), RunState::Failed);

        let kinds = event_kinds(&events_path);
        assert!(kinds.iter().any(|kind| kind == "run_failed"));
        assert!(!kinds.iter().any(|kind| kind == "run_finished"));
        Ok(())
    }

    #[test]
    fn completed_job_without_image_fails_the_run() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let generation = Arc::new(ScriptedGeneration {
            complete_without_url: true,
            ..ScriptedGeneration::default()
        });
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            generation,
            EventLog::new(temp.path().join("events.jsonl"), "run-1"),
            &fast_config(),
        );

        let result = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(!result.success);
        assert!(result
            .error
            .unwrap_or_default()
            .contains("without an image"));
        Ok(())
    }

    #[test]
    fn description_cache_skips_second_vision_call() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let vision = Arc::new(ScriptedVision::ok());
        let pipeline = Pipeline::new(
            Arc::clone(&vision) as Arc<dyn VisionService>,
            Arc::new(ScriptedGeneration::default()),
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let first = pipeline.run(&test_image(), &StylizeOptions::default());
        let second = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(first.success && second.success);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);

        let content = std::fs::read_to_string(&events_path)?;
        let sources: Vec<String> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(|event| event["event"] == Value::String("description_ready".to_string()))
            .filter_map(|event| event["source"].as_str().map(str::to_string))
            .collect();
        assert_eq!(sources, vec!["vision", "cache"]);
        Ok(())
    }

    #[test]
    fn standalone_describe_primes_the_run_cache() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let vision = Arc::new(ScriptedVision::ok());
        let pipeline = Pipeline::new(
            Arc::clone(&vision) as Arc<dyn VisionService>,
            Arc::new(ScriptedGeneration::default()),
            EventLog::new(temp.path().join("events.jsonl"), "run-1"),
            &fast_config(),
        );

        let mut warnings = Vec::new();
        let description = pipeline.describe(&test_image(), None, &mut warnings)?;
        assert_eq!(description.english_text, "a corgi with a red bandana");
        assert!(warnings.is_empty());

        let result = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(result.success, "run failed: {:?}", result.error);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn style_reference_failure_degrades_to_plain_run() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let generation = Arc::new(ScriptedGeneration {
            fail_uploads_after_first: true,
            ..ScriptedGeneration::default()
        });
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            Arc::clone(&generation) as Arc<dyn GenerationService>,
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let options = StylizeOptions {
            style_reference: Some(SourceImage::new(b"reference bytes".to_vec(), "image/jpeg")),
            ..StylizeOptions::default()
        };
        let result = pipeline.run(&test_image(), &options);

        assert!(result.success, "run failed: {:?}", result.error);
        assert!(result
            .warnings
            .iter()
            .any(|warning| warning.contains("style reference upload failed")));

        let submitted = generation.submitted_requests();
        assert_eq!(submitted[0].style_reference_id, None);

        let kinds = event_kinds(&events_path);
        assert!(kinds.iter().any(|kind| kind == "style_reference_skipped"));
        Ok(())
    }

    #[test]
    fn degraded_upload_is_reported_but_not_fatal() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let generation = Arc::new(ScriptedGeneration {
            degrade_transfer: true,
            ..ScriptedGeneration::default()
        });
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            generation,
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let result = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(result.success, "run failed: {:?}", result.error);

        let kinds = event_kinds(&events_path);
        assert!(kinds.iter().any(|kind| kind == "upload_degraded"));
        Ok(())
    }

    #[test]
    fn vision_failure_fails_the_run_before_upload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let generation = Arc::new(ScriptedGeneration::default());
        let pipeline = Pipeline::new(
            Arc::new(ScriptedVision::failing()),
            Arc::clone(&generation) as Arc<dyn GenerationService>,
            EventLog::new(&events_path, "run-1"),
            &fast_config(),
        );

        let result = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(!result.success);
        assert!(result
            .error
            .unwrap_or_default()
            .contains("provider request failed (500)"));
        assert_eq!(pipeline.state(), RunState::Failed);
        assert_eq!(generation.upload_calls.load(Ordering::SeqCst), 0);

        let kinds = event_kinds(&events_path);
        assert!(kinds.iter().any(|kind| kind == "run_failed"));
        assert!(!kinds.iter().any(|kind| kind == "init_image_uploaded"));
        Ok(())
    }

    #[test]
    fn second_run_is_rejected_while_first_is_in_flight() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (gate, receiver) = mpsc::channel();
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(ScriptedVision::ok()),
            Arc::new(GatedGeneration {
                gate: Mutex::new(receiver),
            }),
            EventLog::new(temp.path().join("events.jsonl"), "run-1"),
            &fast_config(),
        ));

        let worker = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.run(&test_image(), &StylizeOptions::default()))
        };

        for _ in 0..400 {
            if pipeline.state() == RunState::Polling {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pipeline.state(), RunState::Polling);

        let rejected = pipeline.run(&test_image(), &StylizeOptions::default());
        assert!(!rejected.success);
        assert!(rejected
            .error
            .unwrap_or_default()
            .contains("already in progress"));
        // The rejection must not disturb the in-flight run's state.
        assert_eq!(pipeline.state(), RunState::Polling);

        gate.send(())?;
        let first = worker.join().expect("worker thread panicked");
        assert!(first.success, "run failed: {:?}", first.error);
        assert_eq!(pipeline.state(), RunState::Complete);
        Ok(())
    }

    #[test]
    fn compose_prompt_prefers_english_segment_and_appends_suffix() {
        let description = Description {
            chinese_text: "一只猫".to_string(),
            english_text: "a tabby cat on a windowsill".to_string(),
            raw_text: "raw".to_string(),
        };
        let registry = StyleRegistry::default();
        let style = registry.get("plush").cloned();
        let prompt = compose_prompt(&description, style.as_ref());
        assert!(prompt.starts_with("a tabby cat on a windowsill, adorable plush toy"));

        let bare = compose_prompt(&description, None);
        assert_eq!(bare, "a tabby cat on a windowsill");
    }

    #[test]
    fn compose_prompt_falls_back_to_raw_text() {
        let description = Description {
            chinese_text: String::new(),
            english_text: "   ".to_string(),
            raw_text: "一只垂耳兔蹲在草地上".to_string(),
        };
        let prompt = compose_prompt(&description, None);
        assert_eq!(prompt, "一只垂耳兔蹲在草地上");
    }
}
