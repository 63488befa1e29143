//! Ties resources owned outside pool memory to a pool's lifetime
//!
//! Run with `RUST_LOG=debug cargo run --example cleanup_demo` to see the
//! pool's own events next to the demo output.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ptr::NonNull;

use nebula_region::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Two owned strings and an open file released as one unit
struct Session {
    greeting: String,
    farewell: String,
    out: BufWriter<File>,
}

fn close_session(data: Option<NonNull<u8>>) {
    let Some(ptr) = data else { return };
    // SAFETY: the blob holds a Session written at registration and the
    // handler runs at most once.
    let mut session = unsafe { ptr.cast::<Session>().as_ptr().read() };
    let line = format!("{} / {}\n", session.greeting, session.farewell);
    if let Err(error) = session.out.write_all(line.as_bytes()) {
        tracing::warn!(%error, "session flush failed");
    }
    info!(greeting = %session.greeting, "session closed");
}

fn free_buffer(len: usize) -> impl FnOnce(Option<NonNull<u8>>) + 'static {
    move |data| {
        let Some(ptr) = data else { return };
        // SAFETY: ptr came from Box::into_raw of a `len`-byte slice.
        let buffer =
            unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len)) };
        info!(bytes = buffer.len(), "external buffer freed");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.txt");

    let mut pool = Pool::with_config(PoolConfig::debug().with_size(1024))?;
    info!(
        block_size = pool.block_size(),
        max_small = pool.max_small_size(),
        "pool created"
    );

    let mut session = pool.register_cleanup(size_of::<Session>())?;
    session.write(Session {
        greeting: String::from("hello world"),
        farewell: String::from("goodbye world"),
        out: BufWriter::new(File::create(&path)?),
    })?;
    session.set_handler(close_session);

    let buffer = vec![0x42u8; 256].into_boxed_slice();
    let len = buffer.len();
    let raw = NonNull::new(Box::into_raw(buffer).cast::<u8>()).ok_or("null buffer")?;
    let mut external = pool.register_cleanup(0)?;
    external.set_data(Some(raw));
    external.set_handler(free_buffer(len));

    let scratch = pool.alloc_slice_copy(&[1u32, 2, 3, 4])?;
    scratch.reverse();
    info!(?scratch, "scratch data");
    let large = pool.alloc(8 * 1024)?;
    info!(large = pool.is_large(large.as_ptr()), "large request served");

    pool.reset();
    info!(contents = %fs::read_to_string(&path)?.trim_end(), "after reset");

    // dataless records still see their handler at teardown
    pool.register_cleanup(0)?.set_handler(|_| info!("teardown handler ran"));
    pool.destroy();

    Ok(())
}
