//! The reader façade: configuration, presets and the decode retry ladder.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use yomu_core::{
    binarize, ArgumentError, BitMatrix, Luminance, SourceImage, DEFAULT_THRESHOLD_FACTOR,
};
use yomu_decode::DecoderResult;
use yomu_detect::{
    DetectionError, Detector, DEFAULT_ALIGNMENT_ALLOWANCE, TIGHT_ALIGNMENT_ALLOWANCE,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::Error;

/// Which 1D barcode families the fallback scanner should try.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarcodeScanner {
    None,
    All,
}

/// Reader configuration. Plain data, cheap to clone, shareable across
/// threads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YomuConfig {
    /// Attempt QR decoding.
    pub enable_qr: bool,
    /// 1D fallback selection, consulted when a [`LinearScanner`] is
    /// registered.
    pub barcode_scanner: BarcodeScanner,
    /// Local-mean fraction for the adaptive binarizer, in (0, 1).
    pub binarizer_threshold: f64,
    /// Half-width, in modules, of the alignment pattern search region used
    /// by the second (relaxed) detection attempt.
    pub alignment_area_allowance: u32,
}

impl Default for YomuConfig {
    fn default() -> Self {
        Self {
            enable_qr: true,
            barcode_scanner: BarcodeScanner::All,
            binarizer_threshold: DEFAULT_THRESHOLD_FACTOR,
            alignment_area_allowance: DEFAULT_ALIGNMENT_ALLOWANCE,
        }
    }
}

/// A 1D barcode pipeline plugged in behind the QR path.
///
/// Linear decoding consumes the same prepared luminance buffer; it lives
/// in a separate crate and is attached through this seam.
pub trait LinearScanner: Send + Sync {
    fn scan(&self, luma: &Luminance<'_>) -> Option<DecoderResult>;
}

/// The decoder façade. An immutable configuration value: build once,
/// share freely, call [`decode`](Yomu::decode) per frame.
#[derive(Clone)]
pub struct Yomu {
    config: YomuConfig,
    linear_scanner: Option<Arc<dyn LinearScanner>>,
}

impl fmt::Debug for Yomu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yomu")
            .field("config", &self.config)
            .field("linear_scanner", &self.linear_scanner.is_some())
            .finish()
    }
}

impl Default for Yomu {
    fn default() -> Self {
        Self::all()
    }
}

impl Yomu {
    /// Build a reader from an explicit configuration.
    pub fn new(config: YomuConfig) -> Result<Self, Error> {
        if !(config.binarizer_threshold > 0.0 && config.binarizer_threshold < 1.0) {
            return Err(Error::Argument(ArgumentError::ThresholdOutOfRange {
                value: config.binarizer_threshold,
            }));
        }
        Ok(Self {
            config,
            linear_scanner: None,
        })
    }

    /// QR decoding plus the 1D fallback.
    pub fn all() -> Self {
        Self {
            config: YomuConfig::default(),
            linear_scanner: None,
        }
    }

    /// QR decoding only.
    pub fn qr_only() -> Self {
        Self {
            config: YomuConfig {
                barcode_scanner: BarcodeScanner::None,
                ..YomuConfig::default()
            },
            linear_scanner: None,
        }
    }

    /// 1D barcodes only (requires a registered [`LinearScanner`]).
    pub fn barcode_only() -> Self {
        Self {
            config: YomuConfig {
                enable_qr: false,
                ..YomuConfig::default()
            },
            linear_scanner: None,
        }
    }

    /// Attach the 1D fallback pipeline.
    pub fn with_linear_scanner(mut self, scanner: Arc<dyn LinearScanner>) -> Self {
        self.linear_scanner = Some(scanner);
        self
    }

    pub fn config(&self) -> &YomuConfig {
        &self.config
    }

    /// Decode the most plausible symbol in the frame.
    ///
    /// Detection runs twice: first with a tight alignment search window,
    /// then with the configured one. A missing QR symbol falls through to
    /// the 1D scanner when one is enabled; unreadable-symbol errors
    /// surface unchanged.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn decode(&self, image: &SourceImage<'_>) -> Result<DecoderResult, Error> {
        let luma = image.to_luminance().map_err(Error::ImageProcessing)?;

        if self.config.enable_qr {
            let bits = binarize(&luma, self.config.binarizer_threshold);
            match self.decode_qr(&bits) {
                Ok(result) => return Ok(result),
                Err(Error::Detection(err)) => {
                    debug!("no QR symbol: {err}");
                }
                Err(other) => return Err(other),
            }
        }

        if self.config.barcode_scanner != BarcodeScanner::None {
            if let Some(scanner) = &self.linear_scanner {
                if let Some(result) = scanner.scan(&luma) {
                    return Ok(result);
                }
            }
        }

        Err(Error::Detection(DetectionError::NothingFound))
    }

    /// Decode every QR symbol in the frame. Empty when QR decoding is
    /// disabled; symbols that detect but fail to decode are skipped.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, image)))]
    pub fn decode_all(&self, image: &SourceImage<'_>) -> Result<Vec<DecoderResult>, Error> {
        if !self.config.enable_qr {
            return Ok(Vec::new());
        }
        let luma = image.to_luminance().map_err(Error::ImageProcessing)?;
        let bits = binarize(&luma, self.config.binarizer_threshold);

        let detector = Detector::new(&bits);
        let mut results = Vec::new();
        for detected in detector.detect_multi(self.config.alignment_area_allowance) {
            match yomu_decode::decode(detected.bits) {
                Ok(result) => results.push(result),
                Err(err) => debug!("skipping undecodable symbol: {err}"),
            }
        }
        Ok(results)
    }

    fn decode_qr(&self, bits: &BitMatrix) -> Result<DecoderResult, Error> {
        let detector = Detector::new(bits);
        match self.detect_and_decode(&detector, TIGHT_ALIGNMENT_ALLOWANCE) {
            Ok(result) => Ok(result),
            Err(err) => {
                debug!("tight-allowance attempt failed, retrying: {err}");
                self.detect_and_decode(&detector, self.config.alignment_area_allowance)
            }
        }
    }

    fn detect_and_decode(
        &self,
        detector: &Detector<'_>,
        allowance: u32,
    ) -> Result<DecoderResult, Error> {
        let detected = detector.detect(allowance).map_err(Error::Detection)?;
        yomu_decode::decode(detected.bits).map_err(Error::from)
    }
}
