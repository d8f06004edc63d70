use crate::core::errors::{ConfigError, ConfigResult};
use std::env;
use std::str::FromStr;

/// Border cropper tuning.
#[derive(Debug, Clone)]
pub struct CropParams {
    /// Grayscale values at or below this count as "black border".
    pub black_threshold: u8,
    /// Pixels of padding added around the detected content box.
    pub padding: u32,
}

/// Adaptive-threshold second pass, used when the edge pass finds too few
/// candidates.
#[derive(Debug, Clone)]
pub struct AdaptiveParams {
    /// Neighborhood sizes swept by the pass (odd, in pixels).
    pub block_sizes: Vec<u32>,
    /// Constants subtracted from the local mean.
    pub constants: Vec<i16>,
    /// Radius of the close+open cleanup (LInf, so 2r+1 square).
    pub morph_radius: u8,
    /// Stop sweeping parameter pairs once this many candidates exist.
    pub target_candidates: usize,
}

/// Tuning for one contour-detection tier.
///
/// `primary()` and `relaxed()` produce the two tiers of the cascade; the
/// relaxed tier trades precision for recall across the board.
#[derive(Debug, Clone)]
pub struct ContourParams {
    /// Gaussian sigma applied before edge detection; 0 disables the blur.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Dilation radius joining broken panel borders (LInf).
    pub dilate_radius: u8,
    /// Morphological close radius (LInf).
    pub close_radius: u8,
    pub min_area_fraction: f64,
    pub max_area_fraction: f64,
    /// Minimum width and height of a candidate, in pixels.
    pub min_dimension: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Candidates above this fraction of the crop area are retained even
    /// when they fail the generic minimum-area filter.
    pub priority_area_fraction: f64,
    /// Candidates within this many pixels of a crop edge are prioritized.
    pub edge_margin: u32,
    /// Each corner zone covers this fraction of each crop dimension.
    /// Small corner panels are the most commonly missed case, so anything
    /// inside a corner zone is prioritized.
    pub corner_zone_fraction: f64,
    /// In-strategy dedup: a candidate survives when its overlap with every
    /// kept candidate is at most this fraction of its own area.
    pub overlap_tolerance: f64,
    /// Run the adaptive pass when fewer than this many candidates survive
    /// the edge pass.
    pub adaptive_trigger: usize,
    pub adaptive: AdaptiveParams,
}

impl ContourParams {
    /// Primary tier: deliberately low Canny thresholds catch faint interior
    /// panel borders; small kernels avoid fusing unrelated artwork.
    pub fn primary() -> Self {
        Self {
            blur_sigma: 0.0,
            canny_low: 30.0,
            canny_high: 90.0,
            dilate_radius: 1,
            close_radius: 2,
            min_area_fraction: 0.001,
            max_area_fraction: 0.98,
            min_dimension: 20,
            min_aspect: 0.1,
            max_aspect: 20.0,
            priority_area_fraction: 0.003,
            edge_margin: 20,
            corner_zone_fraction: 0.25,
            overlap_tolerance: 0.70,
            adaptive_trigger: 2,
            adaptive: AdaptiveParams {
                block_sizes: vec![15, 21],
                constants: vec![5, 10],
                morph_radius: 3,
                target_candidates: 3,
            },
        }
    }

    /// Relaxed tier: last resort, tuned for recall. Stronger blur, lower
    /// edge thresholds, larger kernels, wider area window, and it accepts
    /// near-full-crop panels (full-bleed pages land here).
    pub fn relaxed() -> Self {
        Self {
            blur_sigma: 2.0,
            canny_low: 15.0,
            canny_high: 45.0,
            dilate_radius: 2,
            close_radius: 3,
            min_area_fraction: 0.002,
            max_area_fraction: 0.99,
            min_dimension: 15,
            min_aspect: 0.1,
            max_aspect: 15.0,
            priority_area_fraction: 0.003,
            edge_margin: 20,
            corner_zone_fraction: 0.25,
            overlap_tolerance: 0.80,
            adaptive_trigger: 2,
            adaptive: AdaptiveParams {
                block_sizes: vec![15, 21],
                constants: vec![5, 10],
                morph_radius: 3,
                target_candidates: 3,
            },
        }
    }
}

/// Line-based grid detector tuning.
///
/// Hough parameters scale with crop size: `value = max(floor, dim/divisor)`.
#[derive(Debug, Clone)]
pub struct GridParams {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// A polar line counts as horizontal/vertical within this many degrees.
    pub angle_tolerance_deg: u32,
    /// Accumulator suppression radius for near-duplicate lines.
    pub suppression_radius: u32,
    /// Segments whose perpendicular coordinate agrees within this many
    /// pixels are merged; also the scan band when walking a line.
    pub collinear_tolerance: u32,
    pub vote_floor: u32,
    pub vote_divisor: u32,
    pub line_length_floor: u32,
    pub line_length_divisor: u32,
    pub line_gap_floor: u32,
    pub line_gap_divisor: u32,
    /// Merged segments shorter than this fraction of the corresponding
    /// crop dimension are discarded.
    pub min_line_fraction: f64,
    /// Vertical cuts within `border_fraction_x * width` of either side are
    /// discarded; likewise horizontal cuts against the height.
    pub border_fraction_x: f64,
    pub border_fraction_y: f64,
    /// Cut positions closer than `min(fraction * mean(w,h), cap)` merge.
    pub parallel_merge_fraction: f64,
    pub parallel_merge_cap: u32,
    pub min_cell_dimension: u32,
    pub min_cell_area_fraction: f64,
    pub min_cell_aspect: f32,
    pub max_cell_aspect: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            canny_low: 25.0,
            canny_high: 75.0,
            angle_tolerance_deg: 5,
            suppression_radius: 8,
            collinear_tolerance: 3,
            vote_floor: 50,
            vote_divisor: 10,
            line_length_floor: 30,
            line_length_divisor: 20,
            line_gap_floor: 5,
            line_gap_divisor: 100,
            min_line_fraction: 0.30,
            border_fraction_x: 0.10,
            border_fraction_y: 0.09,
            parallel_merge_fraction: 0.10,
            parallel_merge_cap: 50,
            min_cell_dimension: 20,
            min_cell_area_fraction: 0.001,
            min_cell_aspect: 0.05,
            max_cell_aspect: 20.0,
        }
    }
}

/// Reading-order tuning.
#[derive(Debug, Clone)]
pub struct OrderingParams {
    /// Panels whose top edges differ by less than this many pixels belong
    /// to the same row.
    pub row_epsilon: u32,
}

/// Main engine configuration.
///
/// Every threshold in the pipeline lives here; the defaults reproduce the
/// reference behavior and all of them are tunable.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub crop: CropParams,
    pub contour: ContourParams,
    pub relaxed: ContourParams,
    pub grid: GridParams,
    pub ordering: OrderingParams,
    /// Final overlap bound: no accepted panel may overlap another by more
    /// than this fraction of the smaller panel's area.
    pub max_overlap_fraction: f64,
    /// Contour and grid tiers must yield at least this many panels to be
    /// accepted; the relaxed tier accepts a single panel.
    pub min_accept_panels: usize,
    pub jpeg_quality: u8,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            crop: CropParams {
                black_threshold: 15,
                padding: 5,
            },
            contour: ContourParams::primary(),
            relaxed: ContourParams::relaxed(),
            grid: GridParams::default(),
            ordering: OrderingParams { row_epsilon: 50 },
            max_overlap_fraction: 0.30,
            min_accept_panels: 2,
            jpeg_quality: 90,
        }
    }
}

impl SegmenterConfig {
    /// Build a configuration from defaults plus environment overrides and
    /// validate it.
    pub fn from_env() -> ConfigResult<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(threshold) = env_parse::<u8>("PANEL_CROP_BLACK_THRESHOLD")? {
            config.crop.black_threshold = threshold;
        }
        if let Some(padding) = env_parse::<u32>("PANEL_CROP_PADDING")? {
            config.crop.padding = padding;
        }
        if let Some(low) = env_parse::<f32>("PANEL_CANNY_LOW")? {
            config.contour.canny_low = low;
        }
        if let Some(high) = env_parse::<f32>("PANEL_CANNY_HIGH")? {
            config.contour.canny_high = high;
        }
        if let Some(dim) = env_parse::<u32>("PANEL_MIN_DIMENSION")? {
            config.contour.min_dimension = dim;
        }
        if let Some(epsilon) = env_parse::<u32>("PANEL_ROW_EPSILON")? {
            config.ordering.row_epsilon = epsilon;
        }
        if let Some(fraction) = env_parse::<f64>("PANEL_MAX_OVERLAP_FRACTION")? {
            config.max_overlap_fraction = fraction;
        }
        if let Some(quality) = env_parse::<u8>("PANEL_JPEG_QUALITY")? {
            config.jpeg_quality = quality;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for tier in [&self.contour, &self.relaxed] {
            for fraction in [
                tier.min_area_fraction,
                tier.max_area_fraction,
                tier.priority_area_fraction,
                tier.corner_zone_fraction,
            ] {
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(ConfigError::InvalidAreaFraction(fraction));
                }
            }
            if tier.min_area_fraction >= tier.max_area_fraction {
                return Err(ConfigError::InvalidAreaFraction(tier.min_area_fraction));
            }
            if !(0.0..=1.0).contains(&tier.overlap_tolerance) {
                return Err(ConfigError::InvalidOverlapTolerance(tier.overlap_tolerance));
            }
            if tier.min_aspect >= tier.max_aspect {
                return Err(ConfigError::InvalidAspectRange(
                    tier.min_aspect,
                    tier.max_aspect,
                ));
            }
            if tier.canny_low <= 0.0 || tier.canny_low >= tier.canny_high {
                return Err(ConfigError::InvalidCannyThresholds {
                    low: tier.canny_low,
                    high: tier.canny_high,
                });
            }
        }

        if !(0.0..=1.0).contains(&self.max_overlap_fraction) {
            return Err(ConfigError::InvalidOverlapTolerance(
                self.max_overlap_fraction,
            ));
        }

        if self.grid.canny_low <= 0.0 || self.grid.canny_low >= self.grid.canny_high {
            return Err(ConfigError::InvalidCannyThresholds {
                low: self.grid.canny_low,
                high: self.grid.canny_high,
            });
        }
        for (name, divisor) in [
            ("vote_divisor", self.grid.vote_divisor),
            ("line_length_divisor", self.grid.line_length_divisor),
            ("line_gap_divisor", self.grid.line_gap_divisor),
        ] {
            if divisor == 0 {
                return Err(ConfigError::InvalidGridConfig(format!(
                    "{name} must be > 0"
                )));
            }
        }
        for fraction in [
            self.grid.min_line_fraction,
            self.grid.border_fraction_x,
            self.grid.border_fraction_y,
            self.grid.parallel_merge_fraction,
            self.grid.min_cell_area_fraction,
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ConfigError::InvalidAreaFraction(fraction));
            }
        }
        if self.grid.min_cell_aspect >= self.grid.max_cell_aspect {
            return Err(ConfigError::InvalidAspectRange(
                self.grid.min_cell_aspect,
                self.grid.max_cell_aspect,
            ));
        }

        if self.ordering.row_epsilon == 0 {
            return Err(ConfigError::InvalidRowEpsilon);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(self.jpeg_quality));
        }

        Ok(())
    }
}

/// Parse an optional environment override. Present-but-unparsable values
/// are an error rather than a silent fallback.
fn env_parse<T: FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError(format!("{name}={raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(SegmenterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_aspect_range_rejected() {
        let mut config = SegmenterConfig::default();
        config.contour.min_aspect = 20.0;
        config.contour.max_aspect = 0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAspectRange(_, _))
        ));
    }

    #[test]
    fn test_bad_canny_thresholds_rejected() {
        let mut config = SegmenterConfig::default();
        config.grid.canny_low = 80.0;
        config.grid.canny_high = 40.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCannyThresholds { .. })
        ));
    }

    #[test]
    fn test_overlap_fraction_out_of_range_rejected() {
        let mut config = SegmenterConfig::default();
        config.max_overlap_fraction = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOverlapTolerance(_))
        ));
    }

    #[test]
    fn test_env_override_parse_failure() {
        env::set_var("PANEL_ROW_EPSILON", "not-a-number");
        let result = SegmenterConfig::from_env();
        env::remove_var("PANEL_ROW_EPSILON");
        assert!(matches!(result, Err(ConfigError::EnvVarError(_))));
    }
}
