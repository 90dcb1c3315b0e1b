// Media stage: rehost externally-hosted images onto our blob storage and
// rewrite the article's markdown to point at the copies. Fire-and-forget:
// nothing here ever touches CrawlTask status, and a total failure leaves
// the pipeline outcome untouched.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use folio_common::FolioError;

use crate::tasks::MediaPayload;
use crate::traits::{ArticleStore, ImageHost};

/// Parallel downloads per media task.
const MAX_CONCURRENT_DOWNLOADS: usize = 4;

pub struct MediaStage {
    host: Arc<dyn ImageHost>,
    articles: Arc<dyn ArticleStore>,
}

impl MediaStage {
    pub fn new(host: Arc<dyn ImageHost>, articles: Arc<dyn ArticleStore>) -> Self {
        Self { host, articles }
    }

    pub async fn process(&self, payload: &MediaPayload) -> Result<(), FolioError> {
        let article = match self.articles.get(payload.article_id).await? {
            Some(article) => article,
            None => {
                debug!(article_id = %payload.article_id, "Article gone, skipping rehost");
                return Ok(());
            }
        };
        let Some(mut markdown) = article.markdown_content else {
            return Ok(());
        };

        let key_prefix = format!("articles/{}/images", payload.article_id);
        let key_prefix = key_prefix.as_str();
        let results: Vec<(String, blob_client::Result<String>)> =
            stream::iter(payload.image_urls.iter().cloned())
                .map(|image_url| async move {
                    let rehosted = self.host.rehost(&image_url, key_prefix).await;
                    (image_url, rehosted)
                })
                .buffer_unordered(MAX_CONCURRENT_DOWNLOADS)
                .collect()
                .await;

        let mut rehosted = 0usize;
        for (image_url, result) in results {
            match result {
                Ok(new_url) => {
                    markdown = markdown.replace(image_url.as_str(), &new_url);
                    rehosted += 1;
                }
                Err(err) => {
                    // One bad image must not abort the rest.
                    debug!(image_url = image_url.as_str(), error = %err, "Skipping image");
                }
            }
        }

        self.articles
            .update_markdown(payload.article_id, &markdown)
            .await?;

        info!(
            article_id = %payload.article_id,
            rehosted,
            total = payload.image_urls.len(),
            "Image rehosting finished"
        );
        Ok(())
    }
}
