// Strategy cascade driving panel segmentation: border crop, ordered
// detection strategies with fallback, final overlap filtering,
// materialization, and reading-order assignment.

pub mod materialize;
pub mod order;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info, instrument, warn};

use crate::core::config::SegmenterConfig;
use crate::core::errors::{SegmentationError, SegmentationResult, StrategyResult};
use crate::core::types::{CandidateRect, ImageDimensions, PanelSegmentationResult};
use crate::services::contour::ContourDetector;
use crate::services::cropper::BorderCropper;
use crate::services::grid::GridDetector;
use crate::utils::geometry::dedup_by_overlap;
use crate::utils::metrics::Metrics;

/// One tier of the detection cascade.
///
/// Implementations are pure with respect to the segmenter: they see the
/// grayscale crop and return candidate rectangles in crop-local
/// coordinates, or an error the cascade demotes to zero candidates.
pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Panels this strategy must yield to be accepted as the final result.
    fn min_panels(&self) -> usize;

    fn detect(&self, gray: &GrayImage) -> StrategyResult<Vec<CandidateRect>>;
}

/// The panel segmentation engine.
///
/// Synchronous and stateless per request; clones share configuration,
/// strategies, and the metrics collector, so independent pages may be
/// segmented concurrently from separate threads.
#[derive(Clone)]
pub struct PanelSegmenter {
    config: Arc<SegmenterConfig>,
    strategies: Arc<Vec<Box<dyn DetectionStrategy>>>,
    metrics: Metrics,
}

impl PanelSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self::with_metrics(config, Metrics::new())
    }

    pub fn with_metrics(config: SegmenterConfig, metrics: Metrics) -> Self {
        let strategies: Vec<Box<dyn DetectionStrategy>> = vec![
            Box::new(ContourDetector::primary(config.contour.clone())),
            Box::new(GridDetector::new(config.grid.clone())),
            Box::new(ContourDetector::relaxed(config.relaxed.clone())),
        ];
        Self::with_strategies(config, metrics, strategies)
    }

    /// Build a segmenter with a custom cascade. The order of `strategies`
    /// is the fallback order.
    pub fn with_strategies(
        config: SegmenterConfig,
        metrics: Metrics,
        strategies: Vec<Box<dyn DetectionStrategy>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            strategies: Arc::new(strategies),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Decode an encoded page image and segment it.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn segment_bytes(&self, bytes: &[u8]) -> SegmentationResult<PanelSegmentationResult> {
        let page = image::load_from_memory(bytes)?;
        self.segment(&page)
    }

    /// Segment a decoded page image into panels in reading order.
    #[instrument(skip_all, fields(width = page.width(), height = page.height()))]
    pub fn segment(&self, page: &DynamicImage) -> SegmentationResult<PanelSegmentationResult> {
        let (width, height) = (page.width(), page.height());
        if width == 0 || height == 0 {
            return Err(SegmentationError::InvalidImageSize { width, height });
        }

        let crop_start = Instant::now();
        let cropper = BorderCropper::new(self.config.crop.clone());
        let (region, cropped) = cropper.crop(page);
        self.metrics.record_crop_duration(crop_start.elapsed());

        let gray = cropped.to_luma8();

        let detect_start = Instant::now();
        let accepted = self.run_cascade(&gray);
        self.metrics.record_detect_duration(detect_start.elapsed());

        let Some((winner, candidates)) = accepted else {
            info!("all strategies exhausted, returning empty result");
            self.metrics.record_page(0);
            return Ok(PanelSegmentationResult::empty(width, height));
        };
        self.metrics.record_strategy_win(winner);

        let materialize_start = Instant::now();
        let panels =
            materialize::materialize_panels(page, &region, &candidates, self.config.jpeg_quality)?;
        let panels = order::assign_reading_order(panels, self.config.ordering.row_epsilon);
        self.metrics
            .record_materialize_duration(materialize_start.elapsed());

        let total_panels = panels.len();
        self.metrics.record_page(total_panels);
        info!(total_panels, strategy = winner, "segmentation complete");

        Ok(PanelSegmentationResult {
            reading_order: (1..=total_panels).collect(),
            panels,
            total_panels,
            original_image: ImageDimensions { width, height },
        })
    }

    /// Async convenience wrapper around the synchronous engine.
    pub async fn segment_bytes_async(
        &self,
        bytes: Vec<u8>,
    ) -> SegmentationResult<PanelSegmentationResult> {
        let segmenter = self.clone();
        tokio::task::spawn_blocking(move || segmenter.segment_bytes(&bytes))
            .await
            .map_err(|err| SegmentationError::TaskJoin(err.to_string()))?
    }

    /// Try each strategy in order until one clears its acceptance minimum.
    ///
    /// Every strategy result passes the final overlap bound before being
    /// judged, so accepted panels never overlap by more than the configured
    /// fraction of the smaller panel.
    fn run_cascade(&self, gray: &GrayImage) -> Option<(&'static str, Vec<CandidateRect>)> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let candidates = self.run_strategy(strategy.as_ref(), gray);
            let panels = dedup_by_overlap(candidates, self.config.max_overlap_fraction);

            // Non-terminal tiers must also clear the configured acceptance
            // minimum; the terminal tier stands on its own (the relaxed
            // detector accepts a single full-bleed panel).
            let required = if index + 1 == self.strategies.len() {
                strategy.min_panels()
            } else {
                strategy.min_panels().max(self.config.min_accept_panels)
            };

            if panels.len() >= required {
                debug!(
                    strategy = strategy.name(),
                    panels = panels.len(),
                    "strategy accepted"
                );
                return Some((strategy.name(), panels));
            }
            debug!(
                strategy = strategy.name(),
                panels = panels.len(),
                required,
                "strategy below acceptance minimum, falling through"
            );
        }
        None
    }

    /// Run one strategy, demoting failures and panics to zero candidates so
    /// the cascade advances instead of aborting the call.
    fn run_strategy(&self, strategy: &dyn DetectionStrategy, gray: &GrayImage) -> Vec<CandidateRect> {
        match catch_unwind(AssertUnwindSafe(|| strategy.detect(gray))) {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(err)) => {
                warn!(
                    strategy = strategy.name(),
                    error = %err,
                    "strategy failed, treating as zero candidates"
                );
                self.metrics.record_strategy_error();
                Vec::new()
            }
            Err(_) => {
                warn!(
                    strategy = strategy.name(),
                    "strategy panicked, treating as zero candidates"
                );
                self.metrics.record_strategy_error();
                Vec::new()
            }
        }
    }
}

impl Default for PanelSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}
