mod media_fetcher_port;

pub use media_fetcher_port::MediaFetcherPort;
