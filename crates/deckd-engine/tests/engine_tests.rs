use std::{path::Path, sync::Arc, time::Duration};

use config::{Deck, KeyConfig};
use deckd_engine::{
    DeviceError, EngineCfg, EngineEvent, PushOutcome, Rgb888, RgbColor, render,
    test_support::{MockDevice, TestRig, wait_until, within},
};
use image::{Rgba, RgbaImage};

fn key() -> KeyConfig {
    KeyConfig::default()
}

fn write_png(dir: &Path, name: &str, color: [u8; 4]) -> String {
    let path = dir.join(name);
    RgbaImage::from_pixel(16, 16, Rgba(color)).save(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn fast_cfg() -> EngineCfg {
    EngineCfg {
        counter_interval: Duration::from_millis(5),
        clock_interval: Duration::from_millis(5),
        ..EngineCfg::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn page_of_icons_writes_each_tile_once() {
    let dir = tempfile::tempdir().unwrap();
    let icons = [
        write_png(dir.path(), "r.png", [255, 0, 0, 255]),
        write_png(dir.path(), "g.png", [0, 255, 0, 255]),
        write_png(dir.path(), "b.png", [0, 0, 255, 255]),
    ];
    let page = icons
        .iter()
        .map(|p| KeyConfig {
            icon: Some(p.clone()),
            ..key()
        })
        .collect();
    let rig = TestRig::new(Deck { pages: vec![page] });

    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.write_count() == 3).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(rig.device.write_count(), 3);

    for (tile, icon) in icons.iter().enumerate() {
        let expected = render::load_icon(Path::new(icon), 72).unwrap();
        assert_eq!(rig.device.writes_for(tile), vec![expected], "tile {tile}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_keys_render_black_tiles() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![key(), key()]],
    });
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.write_count() == 2).await);
    let black = render::blank_tile(72);
    for w in rig.device.writes() {
        assert_eq!(w.image, black);
    }
    let cached = rig.engine.deck().key(0, 0).unwrap().cached_image().unwrap();
    assert_eq!(*cached, black);
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_frames_are_dropped_after_page_switch() {
    let (device, gate) = MockDevice::gated();
    let mut rig = TestRig::with_device(
        Deck {
            pages: vec![vec![key(), key(), key()], vec![]],
        },
        device,
        EngineCfg::default(),
    );

    rig.engine.activate_page(0).unwrap();
    // One page-0 frame holds the write gate inside the device.
    assert!(wait_until(2000, || rig.device.in_flight() == 1).await);
    rig.engine.activate_page(1).unwrap();
    gate.add_permits(16);

    assert!(wait_until(2000, || rig.device.in_flight() == 0).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.device.write_count(), 1);
    assert_eq!(
        rig.drain_events(),
        vec![
            EngineEvent::PageChanged { page: 0 },
            EngineEvent::PageChanged { page: 1 }
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn revisiting_a_page_repushes_cached_images() {
    let rig = TestRig::new(Deck {
        pages: vec![
            vec![KeyConfig {
                text: Some("A".into()),
                ..key()
            }],
            vec![key()],
        ],
    });
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.writes_for(0).len() == 1).await);
    let first = rig.engine.deck().key(0, 0).unwrap().cached_image().unwrap();

    rig.engine.activate_page(1).unwrap();
    assert!(wait_until(2000, || rig.device.writes_for(0).len() == 2).await);
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.writes_for(0).len() == 3).await);

    let again = rig.engine.deck().key(0, 0).unwrap().cached_image().unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(rig.device.writes_for(0)[2], *first);
}

#[tokio::test(flavor = "multi_thread")]
async fn device_writes_never_overlap() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![key()]],
    });
    rig.device.set_write_delay(Duration::from_millis(1));
    let img = Arc::new(render::blank_tile(72));

    let mut tasks = Vec::new();
    for i in 0..64 {
        let engine = rig.engine.clone();
        let img = img.clone();
        tasks.push(tokio::spawn(async move {
            engine.push_image(&img, i % 15, 0).await
        }));
    }
    for t in tasks {
        assert_eq!(t.await.unwrap(), PushOutcome::Written);
    }
    assert_eq!(rig.device.write_count(), 64);
    assert_eq!(rig.device.max_concurrent_writes(), 1);
}

#[tokio::test]
async fn push_for_hidden_page_is_discarded() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![key()], vec![key()]],
    });
    let img = render::blank_tile(72);
    assert_eq!(rig.engine.push_image(&img, 0, 1).await, PushOutcome::Discarded);
    assert_eq!(rig.device.write_count(), 0);
}

#[tokio::test]
async fn transport_failure_disconnects() {
    let mut rig = TestRig::new(Deck {
        pages: vec![vec![key()]],
    });
    let img = render::blank_tile(72);
    rig.device
        .fail_next_write(DeviceError::Transport("hidapi: device gone".into()));

    assert_eq!(rig.engine.push_image(&img, 0, 0).await, PushOutcome::Failed);
    assert!(!rig.engine.session().is_open());
    assert_eq!(rig.device.disconnect_count(), 1);
    assert_eq!(rig.drain_events(), vec![EngineEvent::Disconnected]);

    // Further writes are no-ops.
    assert_eq!(rig.engine.push_image(&img, 0, 0).await, PushOutcome::Discarded);
    assert_eq!(rig.device.write_count(), 0);
}

#[tokio::test]
async fn rejected_write_keeps_link_open() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![key()]],
    });
    let img = render::blank_tile(72);
    rig.device
        .fail_next_write(DeviceError::Rejected("bad payload".into()));

    assert_eq!(rig.engine.push_image(&img, 0, 0).await, PushOutcome::Failed);
    assert!(rig.engine.session().is_open());
    assert_eq!(rig.engine.push_image(&img, 0, 0).await, PushOutcome::Written);
    assert_eq!(rig.device.disconnect_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_icon_leaves_tile_unrendered() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_png(dir.path(), "ok.png", [10, 20, 30, 255]);
    let rig = TestRig::new(Deck {
        pages: vec![vec![
            KeyConfig {
                icon: Some("/nonexistent/icon.png".into()),
                ..key()
            },
            KeyConfig {
                icon: Some(good),
                ..key()
            },
        ]],
    });
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.writes_for(1).len() == 1).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rig.device.writes_for(0).is_empty());
    assert!(rig.engine.deck().key(0, 0).unwrap().cached_image().is_none());
    assert!(rig.engine.session().is_open());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_handler_kinds_are_ignored() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![KeyConfig {
            icon_handler: Some("Weather".into()),
            key_handler: Some("Launch".into()),
            ..key()
        }]],
    });
    rig.engine.activate_page(0).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let k = rig.engine.deck().key(0, 0).unwrap();
    assert!(k.cached_image().is_none());
    assert!(k.icon_handler().is_none());
    assert_eq!(rig.device.write_count(), 0);

    rig.engine.press(0).await;
    assert!(k.key_handler().is_none());
    assert!(rig.runner.commands().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_page_changes_nothing() {
    let mut rig = TestRig::new(Deck {
        pages: vec![vec![key()]],
    });
    assert!(rig.engine.activate_page(3).is_err());
    assert_eq!(rig.engine.session().page(), 0);
    assert!(rig.drain_events().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn switch_page_press_activates_target_once() {
    let mut rig = TestRig::new(Deck {
        pages: vec![
            vec![KeyConfig {
                switch_page: 2,
                ..key()
            }],
            vec![key(), key()],
        ],
    });
    let listener = {
        let engine = rig.engine.clone();
        tokio::spawn(async move { engine.listen().await })
    };

    rig.device.press(0).await;
    rig.device.release(0).await;
    assert!(wait_until(2000, || rig.engine.session().page() == 1).await);
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(rig.drain_events(), vec![EngineEvent::PageChanged { page: 1 }]);
    assert!(rig.runner.commands().is_empty());
    assert!(rig.device.brightness_calls().is_empty());

    rig.engine.shutdown();
    assert!(within(1000, listener).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn command_press_launches_exactly_that_command() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![KeyConfig {
            command: Some("notify-send hi".into()),
            keybind: Some(String::new()),
            ..key()
        }]],
    });
    rig.engine.press(0).await;
    assert_eq!(rig.runner.commands(), vec!["notify-send hi".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_configured_action_fires_on_one_press() {
    let mut rig = TestRig::new(Deck {
        pages: vec![
            vec![KeyConfig {
                command: Some("echo one".into()),
                keybind: Some("ctrl+c".into()),
                url: Some("https://example.com".into()),
                switch_page: 2,
                brightness: 40,
                ..key()
            }],
            vec![key()],
        ],
    });
    rig.engine.press(0).await;
    assert_eq!(
        rig.runner.commands(),
        vec![
            "echo one".to_string(),
            "xdotool key ctrl+c".to_string(),
            "xdg-open https://example.com".to_string(),
        ]
    );
    assert_eq!(rig.device.brightness_calls(), vec![40]);
    assert_eq!(rig.engine.session().page(), 1);
    assert_eq!(rig.drain_events(), vec![EngineEvent::PageChanged { page: 1 }]);
}

#[tokio::test(flavor = "multi_thread")]
async fn brightness_failure_is_not_fatal() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![KeyConfig {
            brightness: 250,
            url: Some("https://example.com".into()),
            ..key()
        }]],
    });
    rig.device
        .fail_brightness(DeviceError::Rejected("out of range".into()));
    rig.engine.press(0).await;
    assert!(rig.engine.session().is_open());
    assert_eq!(rig.runner.commands(), vec!["xdg-open https://example.com"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn presses_outside_the_page_are_ignored() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![KeyConfig {
            command: Some("true".into()),
            ..key()
        }]],
    });
    rig.engine.press(7).await;
    assert!(rig.runner.commands().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_input_stream_disconnects() {
    let mut rig = TestRig::new(Deck {
        pages: vec![vec![key()]],
    });
    let listener = {
        let engine = rig.engine.clone();
        tokio::spawn(async move { engine.listen().await })
    };
    rig.device.close_input();
    assert!(within(1000, listener).await.is_some());
    assert!(!rig.engine.session().is_open());
    assert_eq!(rig.device.disconnect_count(), 1);
    assert_eq!(rig.drain_events(), vec![EngineEvent::Disconnected]);
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failure_stops_input_loop() {
    let mut rig = TestRig::new(Deck {
        pages: vec![vec![KeyConfig {
            command: Some("true".into()),
            ..key()
        }]],
    });
    let listener = {
        let engine = rig.engine.clone();
        tokio::spawn(async move { engine.listen().await })
    };
    rig.device
        .fail_next_write(DeviceError::Transport("hidapi: device gone".into()));

    // Input stays open; only the failed tile write can end the loop.
    rig.engine.activate_page(0).unwrap();
    assert!(within(1000, listener).await.is_some());
    assert!(!rig.engine.session().is_open());
    assert_eq!(rig.device.write_count(), 0);
    assert_eq!(rig.device.disconnect_count(), 1);
    assert_eq!(
        rig.drain_events(),
        vec![
            EngineEvent::PageChanged { page: 0 },
            EngineEvent::Disconnected
        ]
    );

    rig.device.press(0).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rig.runner.commands().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_redraws_visible_page() {
    let rig = TestRig::new(Deck {
        pages: vec![vec![key(), key()]],
    });
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.write_count() == 2).await);

    rig.engine.disconnect();
    assert!(!rig.engine.session().is_open());
    rig.engine.reconnect().unwrap();
    assert!(rig.engine.session().is_open());
    assert!(wait_until(2000, || rig.device.write_count() == 4).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn counter_key_drives_counter_icon() {
    let rig = TestRig::with_device(
        Deck {
            pages: vec![vec![KeyConfig {
                icon_handler: Some("Counter".into()),
                key_handler: Some("Counter".into()),
                ..key()
            }]],
        },
        MockDevice::new(),
        fast_cfg(),
    );
    let zero = render::text_tile("0", 72, Rgb888::WHITE);
    let two = render::text_tile("2", 72, Rgb888::WHITE);

    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.writes_for(0).contains(&zero)).await);

    rig.engine.press(0).await;
    rig.engine.press(0).await;
    assert!(wait_until(2000, || rig.device.writes_for(0).contains(&two)).await);

    let k = rig.engine.deck().key(0, 0).unwrap();
    assert!(k.cached_image().is_none());
    assert!(k.key_handler().is_some());
    rig.engine.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn producers_keep_running_but_stay_silent_off_page() {
    let rig = TestRig::with_device(
        Deck {
            pages: vec![
                vec![KeyConfig {
                    icon_handler: Some("Time".into()),
                    ..key()
                }],
                vec![],
            ],
        },
        MockDevice::new(),
        fast_cfg(),
    );
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.write_count() >= 2).await);
    let handler = rig
        .engine
        .deck()
        .key(0, 0)
        .unwrap()
        .icon_handler()
        .unwrap()
        .clone();

    rig.engine.activate_page(1).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let parked = rig.device.write_count();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(rig.device.write_count(), parked);
    assert!(handler.is_running());

    // Coming back reuses the same producer instead of starting another.
    rig.engine.activate_page(0).unwrap();
    assert!(wait_until(2000, || rig.device.write_count() > parked).await);
    let same = rig.engine.deck().key(0, 0).unwrap().icon_handler().unwrap();
    assert!(Arc::ptr_eq(&handler, same));

    rig.engine.shutdown();
    assert!(!handler.is_running());
}
