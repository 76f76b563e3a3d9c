pub mod controller;
pub mod models;

pub use controller::{ChatController, OnboardingStep, normalize_merchant_url};
pub use models::{Message, RenderKind, Role};
