//! Inference adapter contract and the subprocess-backed implementation

mod adapter;
mod python_bridge;

pub use adapter::{
    EngineReadiness, GenerationParameters, InferenceAdapter, InitializationState,
    ParameterOverrides, VoiceReference, CFG_WEIGHT_RANGE, EXAGGERATION_RANGE, TEMPERATURE_RANGE,
};
pub use python_bridge::{PythonBridge, PythonTTSRequest, PythonTTSResponse};
