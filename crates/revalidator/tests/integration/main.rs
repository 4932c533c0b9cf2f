mod concurrency;
mod custom_channel;
mod custom_stores;
mod scenario;
mod utils;
