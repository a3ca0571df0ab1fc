use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::user::{parse_timestamp, UserProfile};

/// Number of jobs the server returns per listing page.
pub const PAGE_SIZE: u64 = 10;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in_progress",
            JobStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "open" => Ok(JobStatus::Open),
            "in_progress" => Ok(JobStatus::InProgress),
            "closed" => Ok(JobStatus::Closed),
            other => Err(format!(
                "Invalid job status '{}'. Valid values: open, in_progress, closed",
                other
            )),
        }
    }
}

/// A job posting as returned by the jobs endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    /// Decimal salaries arrive either as numbers or as strings like "85000.00".
    #[serde(default, deserialize_with = "lenient_salary")]
    pub salary: Option<f64>,
    #[serde(default)]
    pub status: JobStatus,
    /// Username of the author.
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSalary {
    Number(f64),
    Text(String),
}

fn lenient_salary<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawSalary>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawSalary::Number(n)) => Ok(Some(n)),
        Some(RawSalary::Text(text)) => {
            JobDraft::parse_salary(&text).map_err(serde::de::Error::custom)
        }
    }
}

impl Job {
    /// Only the author may edit or delete a posting.
    pub fn is_owned_by(&self, user: &UserProfile) -> bool {
        self.created_by.as_deref() == Some(user.username.as_str())
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_deref())
    }

    /// True when the posting was edited after it was created.
    pub fn was_edited(&self) -> bool {
        match (self.created(), parse_timestamp(self.updated_at.as_deref())) {
            (Some(created), Some(updated)) => updated > created,
            _ => false,
        }
    }
}

/// Payload for creating or replacing a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary: Option<f64>,
    pub status: JobStatus,
}

impl JobDraft {
    /// Parses free-form salary input: blank means "no salary".
    pub fn parse_salary(input: &str) -> Result<Option<f64>, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("Invalid salary '{}'", trimmed))
    }
}

impl From<&Job> for JobDraft {
    fn from(job: &Job) -> Self {
        JobDraft {
            title: job.title.clone(),
            description: job.description.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            salary: job.salary,
            status: job.status,
        }
    }
}

/// Listing filters. Empty values are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilters {
    pub q: Option<String>,
    pub status: Option<JobStatus>,
    pub company: Option<String>,
    pub location: Option<String>,
}

impl JobFilters {
    pub fn to_query(&self, page: u64) -> Vec<(String, String)> {
        let mut query = vec![("page".to_string(), page.max(1).to_string())];
        let text_filters = [
            ("q", &self.q),
            ("company", &self.company),
            ("location", &self.location),
        ];
        for (key, value) in text_filters {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                query.push((key.to_string(), v.to_string()));
            }
        }
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.to_string()));
        }
        query
    }
}

/// The listing endpoint answers either with a paginated envelope or, on
/// servers without pagination, with a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum JobListing {
    Paginated {
        #[serde(default)]
        count: u64,
        results: Vec<Job>,
    },
    Plain(Vec<Job>),
}

/// One page of job postings.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub page: u64,
    /// Total number of jobs matching the filters, across all pages.
    pub count: u64,
    pub results: Vec<Job>,
}

impl JobPage {
    pub(crate) fn from_body(body: &[u8], page: u64) -> Result<Self, serde_json::Error> {
        let listing: JobListing = serde_json::from_slice(body)?;
        let (count, results) = match listing {
            JobListing::Paginated { count, results } => (count, results),
            JobListing::Plain(results) => (results.len() as u64, results),
        };
        Ok(JobPage {
            page: page.max(1),
            count,
            results,
        })
    }

    pub fn total_pages(&self) -> u64 {
        self.count.div_ceil(PAGE_SIZE).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
