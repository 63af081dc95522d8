// Copyright 2025 Elbfetch Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Object catalog: the objects selected for one run.
//!
//! [`ObjectCatalog::select`] lists every day prefix derived from the window,
//! keeps the objects whose last-modified time lies strictly inside it, and
//! sorts them oldest first. Listing errors abort immediately; there is no
//! retry and no deduplication across prefixes (distinct days never share a key).

use crate::config::RunConfig;
use crate::error::RetrievalError;
use crate::metrics::{self, ErrorCategory};
use crate::store::{ObjectStore, StorageObject};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

/// Filtered objects ordered by last-modified time, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectCatalog {
    objects: Vec<StorageObject>,
}

impl ObjectCatalog {
    /// Builds a catalog from already-filtered objects, sorting them.
    ///
    /// The sort is stable: objects sharing a timestamp keep their input order.
    #[must_use]
    pub fn from_objects(mut objects: Vec<StorageObject>) -> Self {
        objects.sort_by_key(|o| o.last_modified);
        Self { objects }
    }

    /// Lists and filters the objects for a run.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::NotFound`] if the bucket does not exist
    /// - [`RetrievalError::Transfer`] if any listing fails
    /// - [`RetrievalError::EmptySelection`] if no object is inside the window
    #[instrument(skip_all, fields(bucket = %config.bucket()))]
    pub async fn select<S>(store: &S, config: &RunConfig) -> Result<Self, RetrievalError>
    where
        S: ObjectStore + ?Sized,
    {
        let window = config.window();
        let prefixes = config.location().prefixes(window);
        info!(
            start = %window.start(),
            end = %window.end(),
            prefixes = prefixes.len(),
            "Listing access-log objects"
        );

        let mut selected = Vec::new();
        for prefix in prefixes.prefixes() {
            let listed = store
                .list(config.bucket(), prefix, config.max_keys())
                .await
                .map_err(|e| RetrievalError::listing(config.bucket(), prefix, e))
                .inspect_err(|e| metrics::increment_errors(e.category()))?;

            if listed.len() >= config.max_keys() {
                warn!(
                    prefix,
                    max_keys = config.max_keys(),
                    "Listing reached the key limit; later objects are not considered"
                );
            }

            let before = selected.len();
            selected.extend(
                listed
                    .into_iter()
                    .filter(|o| window.contains_strict(o.last_modified)),
            );
            debug!(prefix, selected = selected.len() - before, "Listed prefix");
        }
        metrics::increment_prefixes_listed(prefixes.len());

        if selected.is_empty() {
            metrics::increment_errors(ErrorCategory::EmptySelection);
            return Err(RetrievalError::EmptySelection);
        }
        metrics::increment_objects_selected(selected.len());

        let catalog = Self::from_objects(selected);
        info!(
            objects = catalog.len(),
            total_bytes = catalog.total_bytes(),
            "Selected access-log objects"
        );
        Ok(catalog)
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the sum of all object sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.objects.iter().map(|o| o.size_bytes).sum()
    }

    /// Returns the last-modified time of the oldest object.
    #[must_use]
    pub fn oldest_time(&self) -> Option<DateTime<Utc>> {
        self.objects.first().map(|o| o.last_modified)
    }

    /// Returns the last-modified time of the newest object.
    #[must_use]
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.objects.last().map(|o| o.last_modified)
    }

    /// Iterates over the object keys in catalog order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.key.as_str())
    }

    /// Returns the objects in catalog order.
    #[must_use]
    pub fn objects(&self) -> &[StorageObject] {
        &self.objects
    }
}
