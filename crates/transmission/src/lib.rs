//! Transmission channels, asset discovery, and shared normalisers.

pub mod channels;
pub mod crypto;
pub mod discovery;
pub mod tickers;

pub use channels::{
    get_channel_by_type, get_channels_for_event_type, match_channels_by_keywords, ChannelHorizon,
    ChannelType, TransmissionChannel, ALL_CHANNELS,
};
pub use crypto::{
    evaluate_transmission, extract_relevant_assets, normalize_crypto_transmission,
    normalize_relevant_assets, CryptoTransmission,
};
pub use discovery::{
    discover_assets_by_channel_type, discover_assets_for_event, format_discovery_for_prompt,
    DiscoveryResult, MAX_CHANNELS,
};
pub use tickers::{extract_tickers_from_text, validate_tickers};
