use std::sync::Arc;

use db::{
    models::{
        account::{Account, AccountError},
        image::{CreateImage, Image, ImageError},
    },
    DbConn, DbErr,
};
use serde::Deserialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::services::{
    caption::{CaptionApi, CaptionError},
    diffusion::{seed_from_info, DiffusionApi, DiffusionError, Img2ImgRequest, Txt2ImgRequest},
    storage::{ImageStorage, StorageError},
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Diffusion(#[from] DiffusionError),
    #[error(transparent)]
    Caption(#[from] CaptionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Account not found")]
    AccountNotFound,
    #[error("Account has no main image")]
    NoMainImage,
    #[error("Caption API is not available")]
    CaptionUnavailable,
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Resolves the seed to persist for a finished generation: the seed the
/// backend reports in `info`, or `fallback` when the payload is missing,
/// malformed, or has no seed field. Parse problems never abort an
/// otherwise-successful generation.
pub fn final_seed(info: &str, fallback: Option<i64>) -> Option<i64> {
    seed_from_info(info).or(fallback)
}

fn default_dimension() -> i32 {
    512
}

fn default_steps() -> i32 {
    20
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct GenerateBaseImage {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: i32,
    #[serde(default = "default_dimension")]
    pub height: i32,
    #[serde(default = "default_steps")]
    pub steps: i32,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct GenerateDerivedImage {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub width: i32,
    #[serde(default = "default_dimension")]
    pub height: i32,
    #[serde(default = "default_steps")]
    pub steps: i32,
    pub denoising_strength: Option<f64>,
    /// Overrides the pixel source for img2img. The image must belong to the
    /// requesting user; the seed still comes from the account's main image.
    pub init_image_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CaptionImage {
    pub prompt: Option<String>,
}

/// Orchestrates image generation: talks to the diffusion backend, persists
/// the result, and enforces the account seed policy.
///
/// The policy in short: base images are generated with a backend-chosen seed
/// and record whatever seed the backend reports; derived images always reuse
/// the seed of the account's main image so every derived picture shows the
/// same persona.
pub struct GenerationService {
    diffusion: Arc<dyn DiffusionApi>,
    caption: Arc<dyn CaptionApi>,
    storage: ImageStorage,
    auto_set_main_image: bool,
}

impl GenerationService {
    pub fn new(
        diffusion: Arc<dyn DiffusionApi>,
        caption: Arc<dyn CaptionApi>,
        storage: ImageStorage,
        auto_set_main_image: bool,
    ) -> Self {
        Self {
            diffusion,
            caption,
            storage,
            auto_set_main_image,
        }
    }

    pub fn storage(&self) -> &ImageStorage {
        &self.storage
    }

    /// Generates a fresh base image via txt2img. No seed is submitted; the
    /// backend picks one and we record the seed it reports, or none when the
    /// generation info cannot be parsed.
    pub async fn generate_base(
        &self,
        db: &DbConn,
        user_id: Uuid,
        account_id: Option<Uuid>,
        params: &GenerateBaseImage,
    ) -> Result<Image, GenerationError> {
        if params.prompt.trim().is_empty() {
            return Err(GenerationError::Validation(
                "prompt must not be empty".to_string(),
            ));
        }

        let account = match account_id {
            Some(id) => Some(
                Account::find_by_id_for_user(db, id, user_id)
                    .await?
                    .ok_or(GenerationError::AccountNotFound)?,
            ),
            None => None,
        };

        let request = Txt2ImgRequest::new(
            params.prompt.clone(),
            params.negative_prompt.clone(),
            params.width,
            params.height,
            params.steps,
            None,
        );
        let response = self.diffusion.txt2img(request).await?;
        let image_base64 = response.first_image()?;
        let seed = final_seed(&response.info, None);

        let saved = self
            .storage
            .save_base64(user_id, account_id, image_base64)
            .await?;
        let image = Image::create(
            db,
            user_id,
            &CreateImage {
                filename: saved.filename,
                file_path: saved.file_path,
                prompt: params.prompt.clone(),
                negative_prompt: params.negative_prompt.clone(),
                width: params.width,
                height: params.height,
                steps: params.steps,
                seed,
                description: None,
                account_id,
            },
            Uuid::new_v4(),
        )
        .await?;

        if self.auto_set_main_image {
            if let Some(account) = account {
                if account.main_image_id.is_none() {
                    Account::set_main_image(db, account.id, image.id).await?;
                    tracing::info!(
                        account_id = %account.id,
                        image_id = %image.id,
                        "auto-assigned main image"
                    );
                }
            }
        }

        tracing::info!(image_id = %image.id, seed = ?image.seed, "generated base image");
        Ok(image)
    }

    /// Generates a derived image via img2img. The account must have a main
    /// image: its seed anchors the generation even when `init_image_id`
    /// swaps in a different pixel source, and it is also the fallback for
    /// the recorded seed when the backend's info cannot be parsed.
    pub async fn generate_derived(
        &self,
        db: &DbConn,
        user_id: Uuid,
        account_id: Uuid,
        params: &GenerateDerivedImage,
    ) -> Result<Image, GenerationError> {
        if params.prompt.trim().is_empty() {
            return Err(GenerationError::Validation(
                "prompt must not be empty".to_string(),
            ));
        }

        let detail = Account::with_main_image(db, account_id, user_id)
            .await?
            .ok_or(GenerationError::AccountNotFound)?;
        let main_image = detail.main_image.ok_or(GenerationError::NoMainImage)?;
        let anchor_seed = main_image.seed;

        // The init image only overrides the pixel source; the seed anchor is
        // always the main image.
        let source = match params.init_image_id {
            Some(init_id) => Image::find_by_id_for_user(db, init_id, user_id)
                .await?
                .ok_or(GenerationError::Image(ImageError::ImageNotFound))?,
            None => main_image,
        };

        let init_image_base64 = self.storage.read_as_base64(&source.file_path).await?;
        let request = Img2ImgRequest::new(
            params.prompt.clone(),
            params.negative_prompt.clone(),
            params.width,
            params.height,
            params.steps,
            params.denoising_strength,
            init_image_base64,
            anchor_seed,
        );
        let response = self.diffusion.img2img(request).await?;
        let image_base64 = response.first_image()?;
        let seed = final_seed(&response.info, anchor_seed);

        let saved = self
            .storage
            .save_base64(user_id, Some(account_id), image_base64)
            .await?;
        let image = Image::create(
            db,
            user_id,
            &CreateImage {
                filename: saved.filename,
                file_path: saved.file_path,
                prompt: params.prompt.clone(),
                negative_prompt: params.negative_prompt.clone(),
                width: params.width,
                height: params.height,
                steps: params.steps,
                seed,
                description: None,
                account_id: Some(account_id),
            },
            Uuid::new_v4(),
        )
        .await?;

        tracing::info!(image_id = %image.id, seed = ?image.seed, "generated derived image");
        Ok(image)
    }

    /// Captions an existing image and stores the result as its description.
    pub async fn caption_image(
        &self,
        db: &DbConn,
        user_id: Uuid,
        image_id: Uuid,
        params: &CaptionImage,
    ) -> Result<Image, GenerationError> {
        let image = Image::find_by_id_for_user(db, image_id, user_id)
            .await?
            .ok_or(GenerationError::Image(ImageError::ImageNotFound))?;

        if !self.caption.is_healthy().await {
            return Err(GenerationError::CaptionUnavailable);
        }

        let image_base64 = self.storage.read_as_base64(&image.file_path).await?;
        let description = self
            .caption
            .describe(&image_base64, params.prompt.as_deref())
            .await?;

        let updated = Image::set_description(db, image.id, description).await?;
        tracing::info!(image_id = %updated.id, "captioned image");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::Engine;
    use db::models::{
        account::CreateAccount,
        user::{CreateUser, User},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::diffusion::GenerationResponse;

    struct RecordingDiffusion {
        txt2img_requests: Mutex<Vec<Txt2ImgRequest>>,
        img2img_requests: Mutex<Vec<Img2ImgRequest>>,
        info: String,
    }

    impl RecordingDiffusion {
        fn with_info(info: &str) -> Arc<Self> {
            Arc::new(Self {
                txt2img_requests: Mutex::new(Vec::new()),
                img2img_requests: Mutex::new(Vec::new()),
                info: info.to_string(),
            })
        }

        fn response(&self) -> GenerationResponse {
            GenerationResponse {
                images: vec![base64::engine::general_purpose::STANDARD.encode(b"generated")],
                info: self.info.clone(),
            }
        }

        fn last_txt2img(&self) -> Txt2ImgRequest {
            self.txt2img_requests.lock().unwrap().last().unwrap().clone()
        }

        fn last_img2img(&self) -> Img2ImgRequest {
            self.img2img_requests.lock().unwrap().last().unwrap().clone()
        }
    }

    #[async_trait]
    impl DiffusionApi for RecordingDiffusion {
        async fn txt2img(
            &self,
            request: Txt2ImgRequest,
        ) -> Result<GenerationResponse, DiffusionError> {
            self.txt2img_requests.lock().unwrap().push(request);
            Ok(self.response())
        }

        async fn img2img(
            &self,
            request: Img2ImgRequest,
        ) -> Result<GenerationResponse, DiffusionError> {
            self.img2img_requests.lock().unwrap().push(request);
            Ok(self.response())
        }
    }

    struct FailingDiffusion {
        error: fn() -> DiffusionError,
    }

    #[async_trait]
    impl DiffusionApi for FailingDiffusion {
        async fn txt2img(
            &self,
            _request: Txt2ImgRequest,
        ) -> Result<GenerationResponse, DiffusionError> {
            Err((self.error)())
        }

        async fn img2img(
            &self,
            _request: Img2ImgRequest,
        ) -> Result<GenerationResponse, DiffusionError> {
            Err((self.error)())
        }
    }

    struct FakeCaption {
        reply: String,
        healthy: bool,
    }

    #[async_trait]
    impl CaptionApi for FakeCaption {
        async fn describe(
            &self,
            _image_base64: &str,
            _prompt: Option<&str>,
        ) -> Result<String, CaptionError> {
            Ok(self.reply.clone())
        }

        async fn is_healthy(&self) -> bool {
            self.healthy
        }
    }

    struct TestHarness {
        db: DbConn,
        user: User,
        account: db::models::account::Account,
        service: GenerationService,
        tempdir: tempfile::TempDir,
    }

    async fn setup(diffusion: Arc<dyn DiffusionApi>, auto_set_main_image: bool) -> TestHarness {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("connect in-memory sqlite");
        db_migration::Migrator::up(&db, None)
            .await
            .expect("run migrations");

        let user = User::create(
            &db,
            &CreateUser {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                api_token: "token".to_string(),
            },
        )
        .await
        .expect("create user");

        let account = Account::create(
            &db,
            user.id,
            &CreateAccount {
                name: "wanderer".to_string(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create account");

        let tempdir = tempfile::tempdir().expect("create tempdir");
        let storage = ImageStorage::new(tempdir.path().to_path_buf());
        let caption = Arc::new(FakeCaption {
            reply: "a scenic caption".to_string(),
            healthy: true,
        });
        let service = GenerationService::new(diffusion, caption, storage, auto_set_main_image);

        TestHarness {
            db,
            user,
            account,
            service,
            tempdir,
        }
    }

    fn file_count(dir: &std::path::Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { file_count(&path) } else { 1 }
            })
            .sum()
    }

    fn base_params() -> GenerateBaseImage {
        GenerateBaseImage {
            prompt: "studio portrait".to_string(),
            negative_prompt: Some("blurry".to_string()),
            width: 512,
            height: 512,
            steps: 20,
        }
    }

    fn derived_params(init_image_id: Option<Uuid>) -> GenerateDerivedImage {
        GenerateDerivedImage {
            prompt: "at the beach".to_string(),
            negative_prompt: None,
            width: 512,
            height: 512,
            steps: 20,
            denoising_strength: None,
            init_image_id,
        }
    }

    /// Writes an image file plus row and promotes it to the account's main
    /// image, mimicking an earlier base generation with the given seed.
    async fn seed_main_image(harness: &TestHarness, seed: Option<i64>, content: &[u8]) -> Image {
        let saved = harness
            .service
            .storage()
            .save_base64(
                harness.user.id,
                Some(harness.account.id),
                &base64::engine::general_purpose::STANDARD.encode(content),
            )
            .await
            .expect("save image file");

        let image = Image::create(
            &harness.db,
            harness.user.id,
            &CreateImage {
                filename: saved.filename,
                file_path: saved.file_path,
                prompt: "base".to_string(),
                negative_prompt: None,
                width: 512,
                height: 512,
                steps: 20,
                seed,
                description: None,
                account_id: Some(harness.account.id),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create image row");

        Account::set_main_image(&harness.db, harness.account.id, image.id)
            .await
            .expect("set main image");
        image
    }

    #[tokio::test]
    async fn base_generation_lets_the_backend_pick_the_seed() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 424242}"#);
        let harness = setup(diffusion.clone(), false).await;

        let image = harness
            .service
            .generate_base(
                &harness.db,
                harness.user.id,
                Some(harness.account.id),
                &base_params(),
            )
            .await
            .expect("generate base image");

        assert_eq!(diffusion.last_txt2img().seed, -1);
        assert_eq!(image.seed, Some(424242));
        assert!(std::path::Path::new(&image.file_path).exists());
    }

    #[tokio::test]
    async fn base_generation_records_no_seed_when_info_is_garbage() {
        let diffusion = RecordingDiffusion::with_info("not json at all");
        let harness = setup(diffusion, false).await;

        let image = harness
            .service
            .generate_base(&harness.db, harness.user.id, None, &base_params())
            .await
            .expect("generate base image");

        assert_eq!(image.seed, None);
    }

    #[tokio::test]
    async fn base_generation_can_auto_assign_the_main_image() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 7}"#);
        let harness = setup(diffusion, true).await;

        let first = harness
            .service
            .generate_base(
                &harness.db,
                harness.user.id,
                Some(harness.account.id),
                &base_params(),
            )
            .await
            .expect("first generation");

        let account = Account::find_by_id_for_user(&harness.db, harness.account.id, harness.user.id)
            .await
            .expect("reload account")
            .expect("account exists");
        assert_eq!(account.main_image_id, Some(first.id));

        // A second generation must not displace the existing main image.
        harness
            .service
            .generate_base(
                &harness.db,
                harness.user.id,
                Some(harness.account.id),
                &base_params(),
            )
            .await
            .expect("second generation");

        let account = Account::find_by_id_for_user(&harness.db, harness.account.id, harness.user.id)
            .await
            .expect("reload account")
            .expect("account exists");
        assert_eq!(account.main_image_id, Some(first.id));
    }

    #[tokio::test]
    async fn derived_generation_requires_a_main_image() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 1}"#);
        let harness = setup(diffusion.clone(), false).await;

        let result = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(None),
            )
            .await;
        assert!(matches!(result, Err(GenerationError::NoMainImage)));
        assert!(diffusion.img2img_requests.lock().unwrap().is_empty());

        let rows = Image::find_for_user(&harness.db, harness.user.id, &Default::default())
            .await
            .expect("list images");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn upstream_timeout_leaves_no_row_and_no_file() {
        let diffusion = Arc::new(FailingDiffusion {
            error: || DiffusionError::Timeout,
        });
        let harness = setup(diffusion, false).await;

        let result = harness
            .service
            .generate_base(
                &harness.db,
                harness.user.id,
                Some(harness.account.id),
                &base_params(),
            )
            .await;
        assert!(matches!(
            result,
            Err(GenerationError::Diffusion(DiffusionError::Timeout))
        ));

        let rows = Image::find_for_user(&harness.db, harness.user.id, &Default::default())
            .await
            .expect("list images");
        assert!(rows.is_empty());
        assert_eq!(file_count(harness.tempdir.path()), 0);
    }

    #[tokio::test]
    async fn failed_derived_generation_keeps_only_the_main_image() {
        let diffusion = Arc::new(FailingDiffusion {
            error: || DiffusionError::Api {
                status: 500,
                body: "backend exploded".to_string(),
            },
        });
        let harness = setup(diffusion, false).await;
        seed_main_image(&harness, Some(42), b"main-pixels").await;

        let result = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(None),
            )
            .await;
        assert!(matches!(
            result,
            Err(GenerationError::Diffusion(DiffusionError::Api { .. }))
        ));

        let rows = Image::find_for_user(&harness.db, harness.user.id, &Default::default())
            .await
            .expect("list images");
        assert_eq!(rows.len(), 1);
        assert_eq!(file_count(harness.tempdir.path()), 1);
    }

    #[tokio::test]
    async fn derived_generation_reuses_the_main_image_seed() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 12345}"#);
        let harness = setup(diffusion.clone(), false).await;
        seed_main_image(&harness, Some(12345), b"main-pixels").await;

        let image = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(None),
            )
            .await
            .expect("generate derived image");

        let request = diffusion.last_img2img();
        assert_eq!(request.seed, 12345);
        assert_eq!(
            request.init_images,
            vec![base64::engine::general_purpose::STANDARD.encode(b"main-pixels")]
        );
        assert_eq!(image.seed, Some(12345));
    }

    #[tokio::test]
    async fn init_image_override_changes_pixels_but_not_the_seed() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 12345}"#);
        let harness = setup(diffusion.clone(), false).await;
        seed_main_image(&harness, Some(12345), b"main-pixels").await;

        let saved = harness
            .service
            .storage()
            .save_base64(
                harness.user.id,
                Some(harness.account.id),
                &base64::engine::general_purpose::STANDARD.encode(b"other-pixels"),
            )
            .await
            .expect("save override image");
        let override_image = Image::create(
            &harness.db,
            harness.user.id,
            &CreateImage {
                filename: saved.filename,
                file_path: saved.file_path,
                prompt: "other".to_string(),
                negative_prompt: None,
                width: 512,
                height: 512,
                steps: 20,
                seed: Some(999),
                description: None,
                account_id: Some(harness.account.id),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create override image");

        harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(Some(override_image.id)),
            )
            .await
            .expect("generate derived image");

        let request = diffusion.last_img2img();
        assert_eq!(
            request.init_images,
            vec![base64::engine::general_purpose::STANDARD.encode(b"other-pixels")]
        );
        // The seed anchor stays with the main image, not the pixel source.
        assert_eq!(request.seed, 12345);
    }

    #[tokio::test]
    async fn derived_generation_falls_back_to_the_anchor_seed() {
        let diffusion = RecordingDiffusion::with_info("mangled info payload");
        let harness = setup(diffusion, false).await;
        seed_main_image(&harness, Some(12345), b"main-pixels").await;

        let image = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(None),
            )
            .await
            .expect("generate derived image");

        assert_eq!(image.seed, Some(12345));
    }

    #[tokio::test]
    async fn derived_generation_rejects_another_users_init_image() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 1}"#);
        let harness = setup(diffusion, false).await;
        seed_main_image(&harness, Some(42), b"main-pixels").await;

        let other_user = User::create(
            &harness.db,
            &CreateUser {
                username: "eve".to_string(),
                email: "eve@example.com".to_string(),
                api_token: "token-eve".to_string(),
            },
        )
        .await
        .expect("create second user");
        let foreign_image = Image::create(
            &harness.db,
            other_user.id,
            &CreateImage {
                filename: "foreign.png".to_string(),
                file_path: "/tmp/foreign.png".to_string(),
                prompt: "foreign".to_string(),
                negative_prompt: None,
                width: 512,
                height: 512,
                steps: 20,
                seed: None,
                description: None,
                account_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create foreign image");

        let result = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(Some(foreign_image.id)),
            )
            .await;
        assert!(matches!(
            result,
            Err(GenerationError::Image(ImageError::ImageNotFound))
        ));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_upstream_call() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 1}"#);
        let harness = setup(diffusion.clone(), false).await;

        let mut params = base_params();
        params.prompt = "   ".to_string();
        let result = harness
            .service
            .generate_base(&harness.db, harness.user.id, None, &params)
            .await;
        assert!(matches!(result, Err(GenerationError::Validation(_))));
        assert!(diffusion.txt2img_requests.lock().unwrap().is_empty());
    }

    #[test]
    fn final_seed_prefers_the_backend_report() {
        assert_eq!(final_seed(r#"{"seed": 7}"#, Some(12345)), Some(7));
        assert_eq!(final_seed("garbage", Some(12345)), Some(12345));
        assert_eq!(final_seed("garbage", None), None);
        assert_eq!(final_seed(r#"{"seed": "text"}"#, Some(3)), Some(3));
    }

    #[tokio::test]
    async fn main_image_without_seed_submits_random_seed() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 555}"#);
        let harness = setup(diffusion.clone(), false).await;
        seed_main_image(&harness, None, b"main-pixels").await;

        let image = harness
            .service
            .generate_derived(
                &harness.db,
                harness.user.id,
                harness.account.id,
                &derived_params(None),
            )
            .await
            .expect("generate derived image");

        assert_eq!(diffusion.last_img2img().seed, -1);
        assert_eq!(image.seed, Some(555));
    }

    #[tokio::test]
    async fn captioning_stores_the_description() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 1}"#);
        let harness = setup(diffusion, false).await;
        let image = seed_main_image(&harness, Some(1), b"pixels").await;

        let updated = harness
            .service
            .caption_image(
                &harness.db,
                harness.user.id,
                image.id,
                &CaptionImage::default(),
            )
            .await
            .expect("caption image");
        assert_eq!(updated.description.as_deref(), Some("a scenic caption"));
    }

    #[tokio::test]
    async fn captioning_fails_fast_when_the_api_is_down() {
        let diffusion = RecordingDiffusion::with_info(r#"{"seed": 1}"#);
        let mut harness = setup(diffusion, false).await;
        harness.service.caption = Arc::new(FakeCaption {
            reply: String::new(),
            healthy: false,
        });
        let image = seed_main_image(&harness, Some(1), b"pixels").await;

        let result = harness
            .service
            .caption_image(
                &harness.db,
                harness.user.id,
                image.id,
                &CaptionImage::default(),
            )
            .await;
        assert!(matches!(result, Err(GenerationError::CaptionUnavailable)));
    }
}
