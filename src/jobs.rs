//! Job-board endpoints. Every call goes through the [`ApiClient`], so expired
//! access tokens are renewed transparently.

use tracing::{debug, info};

use crate::client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::models::{Job, JobDraft, JobFilters, JobPage};

#[derive(Clone)]
pub struct JobsApi {
    client: ApiClient,
}

impl JobsApi {
    pub fn new(client: ApiClient) -> Self {
        JobsApi { client }
    }

    fn collection_path(&self) -> String {
        format!("{}/", self.client.endpoints().jobs.trim_end_matches('/'))
    }

    fn item_path(&self, id: i64) -> String {
        format!("{}{}/", self.collection_path(), id)
    }

    /// One page of postings matching `filters`. Pages start at 1.
    pub async fn list(&self, filters: &JobFilters, page: u64) -> Result<JobPage> {
        let request = ApiRequest::get(self.collection_path()).query(filters.to_query(page));
        let response = self.client.dispatch(request).await?;
        let listing = JobPage::from_body(response.bytes(), page)?;
        debug!(
            page = listing.page,
            count = listing.count,
            returned = listing.results.len(),
            "Fetched job listing"
        );
        Ok(listing)
    }

    pub async fn get(&self, id: i64) -> Result<Job> {
        self.client
            .dispatch_json(ApiRequest::get(self.item_path(id)))
            .await
    }

    pub async fn create(&self, draft: &JobDraft) -> Result<Job> {
        let request = ApiRequest::post(self.collection_path()).json(draft)?;
        let job: Job = self.client.dispatch_json(request).await?;
        info!(job_id = job.id, "Created job '{}'", job.title);
        Ok(job)
    }

    pub async fn update(&self, id: i64, draft: &JobDraft) -> Result<Job> {
        let request = ApiRequest::put(self.item_path(id)).json(draft)?;
        let job: Job = self.client.dispatch_json(request).await?;
        info!(job_id = job.id, "Updated job '{}'", job.title);
        Ok(job)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .dispatch(ApiRequest::delete(self.item_path(id)))
            .await?;
        info!(job_id = id, "Deleted job");
        Ok(())
    }
}
