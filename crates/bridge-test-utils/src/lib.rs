// bridge-test-utils: shared test doubles for the assist-bridge suite.
//
// Provides a scripted conversational-AI facade, a recording durable
// publisher, WebSocket test clients for both planes, and a JWT mint for
// hub auth tests.

pub mod audiohook_client;
pub mod durable;
pub mod jwt;
pub mod mock_ai;
pub mod ui_client;

pub use audiohook_client::AudiohookClient;
pub use durable::RecordingDurablePublisher;
pub use jwt::mint_jwt;
pub use mock_ai::{MockConversationAi, MockError, SessionScript, final_response, interim_response};
pub use ui_client::UiClient;
