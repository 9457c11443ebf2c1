use std::{convert::TryFrom, path::Path};

use anyhow::{Result, bail};
use scanner::ObjectDetector;
use tch::{Device, Kind, Tensor};
use tracing::info;
use video_ingest::Frame;

use crate::preprocess::{DEFAULT_CONFIDENCE, count_confident, frame_to_chw};

/// TorchScript detector reporting how many objects clear the confidence bar.
pub struct TorchObjectDetector {
    module: tch::CModule,
    device: Device,
    input_size: u32,
    confidence_threshold: f32,
}

impl TorchObjectDetector {
    /// Load a TorchScript module on CUDA when available, CPU otherwise.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let device = Device::cuda_if_available();
        let module = tch::CModule::load_on_device(model_path.as_ref(), device)?;
        info!(
            model = %model_path.as_ref().display(),
            ?device,
            input_size,
            "Object detector loaded"
        );
        Ok(Self {
            module,
            device,
            input_size,
            confidence_threshold: DEFAULT_CONFIDENCE,
        })
    }

    fn to_tensor(&self, frame: &Frame) -> Result<Tensor> {
        let side = i64::from(self.input_size);
        let chw = frame_to_chw(frame, self.input_size)?;
        Ok(Tensor::from_slice(&chw)
            .view([1, 3, side, side])
            .to_kind(Kind::Float)
            .to_device(self.device))
    }
}

impl ObjectDetector for TorchObjectDetector {
    fn detect(&mut self, frame: &Frame) -> Result<usize> {
        let input = self.to_tensor(frame)?;
        let output = tch::no_grad(|| self.module.forward_ts(&[input]))?;
        let shape = output.size();
        if shape.len() != 3 {
            bail!("unexpected detector output shape: {shape:?}");
        }
        if shape[0] != 1 {
            bail!("detector expected batch=1 but received {}", shape[0]);
        }
        if shape[1] < 5 {
            bail!(
                "detector output requires at least 5 channels (x,y,w,h,conf), got {}",
                shape[1]
            );
        }

        let preds = output
            .to_device(Device::Cpu)
            .squeeze_dim(0)
            .permute([1, 0])
            .contiguous();
        let rows = Vec::<Vec<f32>>::try_from(&preds)?;
        Ok(count_confident(&rows, self.confidence_threshold))
    }
}
