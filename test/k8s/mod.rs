// disable miri tests as they need a cluster
#[cfg(not(miri))]
mod common;

#[cfg(not(miri))]
mod image_pull;
