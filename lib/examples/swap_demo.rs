//! Runs a software client and a handful of consumer threads against one
//! swap bundle, printing what each party observes. Useful for eyeballing
//! the throttling and framedropping behaviors:
//!
//! ```text
//! cargo run --example swap_demo -- --buffers 3 --frames 120 --framedrop
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{App, Arg};

use swapframe::allocator::Buffer;
use swapframe::bundle::SwapBundle;
use swapframe::memory::MemoryBufferAllocator;
use swapframe::{BufferProperties, BufferUsage, PixelFormat, Size};

fn main() {
    env_logger::init();

    let matches = App::new("swap bundle demo")
        .arg(
            Arg::with_name("buffers")
                .long("buffers")
                .takes_value(true)
                .default_value("3")
                .help("Number of buffers in the pool"),
        )
        .arg(
            Arg::with_name("frames")
                .long("frames")
                .takes_value(true)
                .default_value("60")
                .help("Number of frames for the client to render"),
        )
        .arg(
            Arg::with_name("framedrop")
                .long("framedrop")
                .help("Let the client overwrite unconsumed frames instead of waiting"),
        )
        .get_matches();

    let buffers = clap::value_t!(matches.value_of("buffers"), usize)
        .unwrap_or_else(|e| panic!("Invalid value for buffers: {}", e));
    let frames = clap::value_t!(matches.value_of("frames"), usize)
        .unwrap_or_else(|e| panic!("Invalid value for frames: {}", e));

    let properties = BufferProperties::new(
        Size::new(640, 480),
        PixelFormat::from(b"XR24"),
        BufferUsage::SOFTWARE,
    );
    let bundle = Arc::new(
        SwapBundle::new(buffers, &MemoryBufferAllocator::new(), properties)
            .expect("failed to create swap bundle"),
    );
    bundle.allow_framedropping(matches.is_present("framedrop"));

    let done = Arc::new(AtomicBool::new(false));

    // One output refreshing at 60Hz.
    let compositor = {
        let bundle = Arc::clone(&bundle);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut shown = 0usize;
            while !done.load(Ordering::Relaxed) {
                let frame = bundle.compositor_acquire();
                println!("compositor: showing {}", frame.id());
                bundle.compositor_release(&frame).unwrap();
                shown += 1;
                thread::sleep(Duration::from_millis(16));
            }
            shown
        })
    };

    // A screenshot taker polling at 10Hz.
    let snapshotter = {
        let bundle = Arc::clone(&bundle);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let frame = bundle.snapshot_acquire();
                println!("snapshot:   copied {}", frame.id());
                bundle.snapshot_release(&frame).unwrap();
                thread::sleep(Duration::from_millis(100));
            }
        })
    };

    // The client renders as fast as it can; with framedropping disabled it
    // is throttled to the compositor's pace by client_acquire.
    for frame_nr in 0..frames {
        let frame = bundle.client_acquire();
        frame.map().fill((frame_nr % 256) as u8);
        bundle.client_release(&frame).unwrap();
    }

    done.store(true, Ordering::Relaxed);
    let shown = compositor.join().unwrap();
    snapshotter.join().unwrap();

    println!(
        "client rendered {} frames, compositor showed {} ({})",
        frames,
        shown,
        if bundle.framedropping_allowed() {
            "framedropping"
        } else {
            "synchronous"
        }
    );
}
