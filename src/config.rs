use anyhow::Result;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub storage_path: String,
    pub max_pages_per_project: usize,
    pub max_issues_per_page: usize,
    pub max_roi_width: i32,
    pub max_roi_height: i32,
    pub roi_margin: i32,
    pub merge_threshold: i32,
    pub worker_count: usize,
    pub max_job_attempts: i32,
    pub retry_backoff_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "./storage".to_string()),
            max_pages_per_project: env::var("MAX_PAGES_PER_PROJECT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            max_issues_per_page: env::var("MAX_ISSUES_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            max_roi_width: env::var("MAX_ROI_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            max_roi_height: env::var("MAX_ROI_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            roi_margin: env::var("ROI_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(40),
            merge_threshold: env::var("MERGE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            worker_count: env::var("WORKER_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            max_job_attempts: env::var("MAX_JOB_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_backoff_secs: env::var("RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: "./storage".to_string(),
            max_pages_per_project: 100,
            max_issues_per_page: 20,
            max_roi_width: 500,
            max_roi_height: 500,
            roi_margin: 40,
            merge_threshold: 20,
            worker_count: 4,
            max_job_attempts: 3,
            retry_backoff_secs: 2,
        }
    }
}
