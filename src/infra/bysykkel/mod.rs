mod client;

pub use client::BysykkelTripSource;
