//! Completion side of the relay: directive parsing, the completion gateway
//! and the per-event pipeline shared by every ingress.

pub mod directive;
pub mod event;
pub mod gateway;
pub mod openai;
pub mod pipeline;
pub mod worker;

pub use directive::{Directive, DirectiveRole};
pub use event::InboundEvent;
pub use gateway::{ChatResult, CompletionGateway, GatewayError, ImageResult};
pub use openai::OpenAiGateway;
pub use pipeline::Pipeline;
pub use worker::WorkerPool;
