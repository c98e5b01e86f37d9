// ABOUTME: Pulls every image a stack references before anything is torn down.
// ABOUTME: Registry credentials are only sent for images hosted on the session's registry.

use crate::credentials::Session;
use crate::runtime::ImageOps;
use crate::stack::StackDefinition;
use crate::types::ImageRef;

use super::error::PullError;

/// Images now present locally.
#[derive(Debug, Clone, Default)]
pub struct PullSummary {
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFetcher;

impl ImageFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Pull the stack's images and check each one landed.
    ///
    /// Re-pulling an image that is already current is a no-op on the engine
    /// side, so this is safe to repeat.
    pub async fn pull<R: ImageOps + ?Sized>(
        &self,
        runtime: &R,
        stack: &StackDefinition,
        session: &Session,
    ) -> Result<PullSummary, PullError> {
        let mut pulled = Vec::new();

        for image in stack.images() {
            let auth = session.covers(image).then(|| session.auth());
            tracing::debug!(
                "pulling {} ({})",
                image,
                if auth.is_some() { "authenticated" } else { "anonymous" }
            );

            runtime
                .pull_image(image, auth)
                .await
                .map_err(|e| PullError::from_image_error(image.to_string(), e, |s| session.scrub(s)))?;

            match runtime.image_exists(image).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(PullError::Missing {
                        image: image.to_string(),
                    });
                }
                Err(e) => {
                    return Err(PullError::Inspect {
                        image: image.to_string(),
                        reason: session.scrub(&e.to_string()),
                    });
                }
            }

            pulled.push(image.clone());
        }

        tracing::info!("pulled {} image(s) for {}", pulled.len(), stack.name);
        Ok(PullSummary { images: pulled })
    }
}
