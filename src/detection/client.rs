use std::path::Path;

use image::GenericImageView;
use reqwest::multipart::{Form, Part};

use super::types::{DetectionOutcome, DetectionReply};
use crate::config::GuideConfig;
use crate::error::PipelineError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const IMAGE_FIELD: &str = "image";
const UPLOAD_FILENAME: &str = "guidepost_image.jpg";

/// Client for the remote vision service.
///
/// Uploads a captured image plus instruction/picture indices and parses the
/// structured detection reply. Transport failures are terminal for the
/// capture that triggered them; nothing is retried here.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: reqwest::Client,
    base_url: String,
    detector_endpoint: String,
    parser_endpoint: String,
}

impl DetectionClient {
    pub fn new(config: &GuideConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.server_url.trim_end_matches('/').to_string(),
            detector_endpoint: config.detector_endpoint.clone(),
            parser_endpoint: config.parser_endpoint.clone(),
        }
    }

    /// Upload an image for object detection.
    ///
    /// Validates locally before any network call: the file must exist and be
    /// non-empty, and `instruction_index` must be inside the current set.
    pub async fn submit(
        &self,
        image_path: &Path,
        instruction_index: usize,
        picture_index: usize,
        instruction_count: usize,
    ) -> Result<DetectionOutcome, PipelineError> {
        let (bytes, image_size) =
            load_image(image_path, instruction_index, instruction_count).await?;

        let form = Form::new()
            .part(
                IMAGE_FIELD,
                Part::bytes(bytes)
                    .file_name(UPLOAD_FILENAME)
                    .mime_str("image/jpeg")
                    .map_err(|err| PipelineError::DetectionTransport(err.to_string()))?,
            )
            .text("instructionNum", instruction_index.to_string())
            .text("pictureNum", picture_index.to_string());

        let url = format!("{}/{}", self.base_url, self.detector_endpoint);
        log_info!(
            "uploading image for instruction {} picture {} to {}",
            instruction_index,
            picture_index,
            url
        );

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PipelineError::DetectionTransport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_warn!("detection server answered {status}: {body}");
            return Err(PipelineError::DetectionTransport(format!(
                "server answered {status}"
            )));
        }

        let reply: DetectionReply = response
            .json()
            .await
            .map_err(|err| PipelineError::DetectionTransport(err.to_string()))?;

        Ok(reply.into_outcome(image_size))
    }

    /// Upload an operator image to the instruction parser endpoint.
    ///
    /// The reply body is the parser's own bookkeeping; only success matters
    /// to the pipeline.
    pub async fn submit_to_parser(
        &self,
        image_path: &Path,
        instruction_index: usize,
        instruction_count: usize,
    ) -> Result<(), PipelineError> {
        let (bytes, _) = load_image(image_path, instruction_index, instruction_count).await?;

        let form = Form::new()
            .part(
                IMAGE_FIELD,
                Part::bytes(bytes)
                    .file_name(UPLOAD_FILENAME)
                    .mime_str("image/jpeg")
                    .map_err(|err| PipelineError::DetectionTransport(err.to_string()))?,
            )
            .text("instructionNum", instruction_index.to_string());

        let url = format!("{}/{}", self.base_url, self.parser_endpoint);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PipelineError::DetectionTransport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::DetectionTransport(format!(
                "parser answered {}",
                response.status()
            )));
        }

        log_info!("instruction {} image parsed by server", instruction_index);
        Ok(())
    }
}

/// Pre-submission validation shared by both endpoints. Returns the image
/// bytes and the decoded resolution of the file that will be uploaded.
async fn load_image(
    image_path: &Path,
    instruction_index: usize,
    instruction_count: usize,
) -> Result<(Vec<u8>, (u32, u32)), PipelineError> {
    if instruction_index >= instruction_count {
        return Err(PipelineError::OutOfRangeInstruction {
            index: instruction_index,
            count: instruction_count,
        });
    }

    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(|_| PipelineError::MissingImageFile(image_path.to_path_buf()))?;
    if bytes.is_empty() {
        return Err(PipelineError::MissingImageFile(image_path.to_path_buf()));
    }

    let image_size = image::load_from_memory(&bytes)
        .map(|img| img.dimensions())
        .map_err(|_| PipelineError::MissingImageFile(image_path.to_path_buf()))?;

    Ok((bytes, image_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionOutcome;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GuideConfig {
        let mut config = GuideConfig::default();
        config.server_url = server.uri();
        config
    }

    fn write_test_jpeg(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("capture.jpg");
        let img = image::RgbImage::from_pixel(64, 48, image::Rgb([200, 10, 10]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn rejects_missing_file_before_any_network_call() {
        let server = MockServer::start().await;
        let client = DetectionClient::new(&config_for(&server));

        let err = client
            .submit(Path::new("/nonexistent/capture.jpg"), 0, 0, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingImageFile(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_out_of_range_instruction() {
        let server = MockServer::start().await;
        let client = DetectionClient::new(&config_for(&server));
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_jpeg(&dir);

        let err = client.submit(&image_path, 5, 0, 3).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OutOfRangeInstruction { index: 5, count: 3 }
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn parses_a_successful_detection_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": "press",
                "center": [320.0, 240.0],
                "confidence": [0.92],
                "boxes": [[300.0, 220.0, 340.0, 260.0]],
                "phrases": ["button"],
            })))
            .mount(&server)
            .await;

        let client = DetectionClient::new(&config_for(&server));
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_jpeg(&dir);

        let outcome = client.submit(&image_path, 0, 0, 2).await.unwrap();
        match outcome {
            DetectionOutcome::Detected(result) => {
                assert_eq!(result.action_label, "press");
                assert_eq!(result.image_point.x, 320.0);
                assert_eq!(result.image_size, (64, 48));
                assert_eq!(result.confidence, Some(0.92));
            }
            DetectionOutcome::Empty => panic!("expected detection"),
        }
    }

    #[tokio::test]
    async fn server_failure_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_image"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = DetectionClient::new(&config_for(&server));
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_jpeg(&dir);

        let err = client.submit(&image_path, 0, 0, 2).await.unwrap_err();
        assert!(matches!(err, PipelineError::DetectionTransport(_)));
    }

    #[tokio::test]
    async fn empty_action_reply_is_a_recoverable_miss() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": "",
                "center": [],
            })))
            .mount(&server)
            .await;

        let client = DetectionClient::new(&config_for(&server));
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_jpeg(&dir);

        let outcome = client.submit(&image_path, 0, 0, 2).await.unwrap();
        assert!(matches!(outcome, DetectionOutcome::Empty));
    }
}
