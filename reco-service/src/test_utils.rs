use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::content::{ContentError, ContentMetadata};
use crate::time::TimeSource;

/// In-memory content-metadata service. Unknown posts have no tags and
/// unknown tags match no posts; failures can be injected per post or tag.
#[derive(Default)]
pub struct MemoryContent {
    post_tags: HashMap<String, Vec<String>>,
    tag_posts: HashMap<String, Vec<String>>,
    failing_posts: HashSet<String>,
    failing_tags: HashSet<String>,
    tag_lookups: Mutex<Vec<String>>,
    searches: Mutex<Vec<(String, usize)>>,
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(mut self, post_id: &str, tags: &[&str]) -> Self {
        self.post_tags.insert(
            post_id.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_tag(mut self, tag: &str, post_ids: &[&str]) -> Self {
        self.tag_posts.insert(
            tag.to_string(),
            post_ids.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_failing_post(mut self, post_id: &str) -> Self {
        self.failing_posts.insert(post_id.to_string());
        self
    }

    pub fn with_failing_tag(mut self, tag: &str) -> Self {
        self.failing_tags.insert(tag.to_string());
        self
    }

    /// Post ids whose tags were requested, in call order.
    pub fn tag_lookups(&self) -> Vec<String> {
        self.tag_lookups.lock().unwrap().clone()
    }

    /// `(tag, page_size)` of every search, in call order.
    pub fn searches(&self) -> Vec<(String, usize)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentMetadata for MemoryContent {
    async fn post_tags(&self, post_id: &str) -> Result<Vec<String>, ContentError> {
        self.tag_lookups.lock().unwrap().push(post_id.to_string());
        if self.failing_posts.contains(post_id) {
            return Err(ContentError::Decode("injected failure".to_string()));
        }
        Ok(self.post_tags.get(post_id).cloned().unwrap_or_default())
    }

    async fn posts_by_tag(
        &self,
        tag: &str,
        page_size: usize,
    ) -> Result<Vec<String>, ContentError> {
        self.searches
            .lock()
            .unwrap()
            .push((tag.to_string(), page_size));
        if self.failing_tags.contains(tag) {
            return Err(ContentError::Decode("injected failure".to_string()));
        }
        let posts = self.tag_posts.get(tag).cloned().unwrap_or_default();
        Ok(posts.into_iter().take(page_size).collect())
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(OffsetDateTime::UNIX_EPOCH)
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}
