#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rentseek::{ListingPage, Pagination, PropertiesApi, RawParams};
use serde_json::Value;

/// Programmable Properties API: scripted (delay, total) responses first,
/// then a fixed default total. Records every list call.
pub struct MockApi {
    calls: Mutex<Vec<RawParams>>,
    script: Mutex<VecDeque<(Duration, u64)>>,
    default_total: u64,
    pub fail_lists: AtomicBool,
    pub area_records: Mutex<Option<Vec<Value>>>,
}

impl MockApi {
    pub fn new(default_total: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default_total,
            fail_lists: AtomicBool::new(false),
            area_records: Mutex::new(None),
        })
    }

    pub fn push_response(&self, delay: Duration, total: u64) {
        self.script.lock().unwrap().push_back((delay, total));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<RawParams> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn page(total: u64) -> ListingPage {
        ListingPage {
            data: Vec::new(),
            pagination: Some(Pagination {
                total,
                pages: 1,
                has_next: false,
                has_prev: false,
            }),
        }
    }
}

#[async_trait]
impl PropertiesApi for MockApi {
    async fn list(&self, params: &RawParams) -> Result<ListingPage> {
        self.calls.lock().unwrap().push(params.clone());
        if self.fail_lists.load(Ordering::SeqCst) {
            anyhow::bail!("mock transport failure");
        }
        let scripted = self.script.lock().unwrap().pop_front();
        if let Some((delay, total)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(Self::page(total));
        }
        Ok(Self::page(self.default_total))
    }

    async fn areas(&self) -> Result<Vec<Value>> {
        match self.area_records.lock().unwrap().clone() {
            Some(records) => Ok(records),
            None => anyhow::bail!("mock area directory down"),
        }
    }
}
