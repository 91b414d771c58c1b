//! End-to-end golden vectors for the concrete scenarios: one test per
//! scenario, built only against the public `dccl` API.

use assert_matches::assert_matches;

use dccl::{
    CodecVersion, Engine, Error, FieldDescriptorBuilder, FieldOptions, FieldValue, Label, Message,
    MessageDescriptorBuilder, MessageOptions, Result, WireKind,
};

/// Scenario 1: navigation report, codec_version 3 — id=124, max_bytes=32,
/// x/y/z doubles plus a packed enum and a required bool.
fn navigation_report() -> dccl::MessageDescriptor {
    let mut x = FieldDescriptorBuilder::new(1, "x");
    x.wire_kind(WireKind::Double).label(Label::Required).options(FieldOptions {
        min: Some(-10000.0),
        max: Some(10000.0),
        precision: 1,
        ..Default::default()
    });
    let mut y = FieldDescriptorBuilder::new(2, "y");
    y.wire_kind(WireKind::Double).label(Label::Required).options(FieldOptions {
        min: Some(-10000.0),
        max: Some(10000.0),
        precision: 1,
        ..Default::default()
    });
    let mut z = FieldDescriptorBuilder::new(3, "z");
    z.wire_kind(WireKind::Double).label(Label::Required).options(FieldOptions {
        min: Some(-5000.0),
        max: Some(0.0),
        precision: 0,
        ..Default::default()
    });
    let mut veh_class = FieldDescriptorBuilder::new(4, "veh_class");
    veh_class.wire_kind(WireKind::Enum).label(Label::Required).options(FieldOptions {
        enum_count: Some(3), // AUV=0, USV=1, SHIP=2
        packed_enum: true,
        ..Default::default()
    });
    let mut battery_ok = FieldDescriptorBuilder::new(5, "battery_ok");
    battery_ok.wire_kind(WireKind::Bool).label(Label::Required);

    let mut builder = MessageDescriptorBuilder::new("NavigationReport");
    builder
        .add_field(x.build().unwrap())
        .add_field(y.build().unwrap())
        .add_field(z.build().unwrap())
        .add_field(veh_class.build().unwrap())
        .add_field(battery_ok.build().unwrap())
        .options(MessageOptions {
            id: Some(124),
            max_bytes: 32,
            codec_version: Some(CodecVersion::V3),
            ..Default::default()
        });
    builder.build().unwrap()
}

#[test]
fn navigation_report_round_trips() -> Result<()> {
    let mut engine = Engine::new();
    engine.load(navigation_report())?;

    let mut msg = Message::new();
    msg.set(1, FieldValue::F64(450.0));
    msg.set(2, FieldValue::F64(550.0));
    msg.set(3, FieldValue::F64(-100.0));
    msg.set(4, FieldValue::Enum(0)); // AUV
    msg.set(5, FieldValue::Bool(true));

    let bytes = engine.encode(124, &msg)?;
    assert_eq!(bytes[0] >> 1, 124, "short-form id byte carries 124 in its high 7 bits");
    assert_eq!(engine.id(&bytes)?, 124);
    assert_eq!(bytes.len(), engine.size(124, &msg)?);

    let (id, decoded, consumed) = engine.decode(&bytes)?;
    assert_eq!(id, 124);
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded.get(1).unwrap().as_f64().unwrap(), 450.0);
    assert_eq!(decoded.get(2).unwrap().as_f64().unwrap(), 550.0);
    assert_eq!(decoded.get(3).unwrap().as_f64().unwrap(), -100.0);
    assert_eq!(decoded.get(4).unwrap().as_enum().unwrap(), 0);
    assert_eq!(decoded.get(5).unwrap().as_bool().unwrap(), true);
    Ok(())
}

/// `encode_to_writer`/`decode_from_reader` round-trip through an in-memory
/// `Cursor`, exercising the same frame `encode`/`decode` produce.
#[test]
fn stream_round_trip_through_reader_and_writer() -> Result<()> {
    let mut engine = Engine::new();
    engine.load(navigation_report())?;

    let mut msg = Message::new();
    msg.set(1, FieldValue::F64(450.0));
    msg.set(2, FieldValue::F64(550.0));
    msg.set(3, FieldValue::F64(-100.0));
    msg.set(4, FieldValue::Enum(0));
    msg.set(5, FieldValue::Bool(true));

    let mut out = Vec::new();
    engine.encode_to_writer(124, &msg, &mut out)?;
    assert_eq!(out.len(), engine.size(124, &msg)?);

    let mut cursor = std::io::Cursor::new(out.clone());
    let (id, decoded, consumed) = engine.decode_from_reader(&mut cursor, out.len())?;
    assert_eq!(id, 124);
    assert_eq!(consumed, out.len());
    assert_eq!(decoded.get(1).unwrap().as_f64().unwrap(), 450.0);
    Ok(())
}

/// A reader that can't supply the requested frame length surfaces as
/// `Error::Io`, not a panic or a silently truncated message.
#[test]
fn decode_from_reader_propagates_io_error_on_short_read() {
    let mut engine = Engine::new();
    engine.load(navigation_report()).unwrap();

    let mut cursor = std::io::Cursor::new(vec![0u8; 2]);
    assert_matches!(engine.decode_from_reader(&mut cursor, 32), Err(Error::Io(_)));
}

fn clamped_field() -> dccl::MessageDescriptor {
    let mut f = FieldDescriptorBuilder::new(1, "level");
    f.wire_kind(WireKind::Int32).label(Label::Required).options(FieldOptions {
        min: Some(0.0),
        max: Some(100.0),
        precision: 0,
        ..Default::default()
    });
    let mut builder = MessageDescriptorBuilder::new("Level");
    builder.add_field(f.build().unwrap()).options(MessageOptions {
        id: Some(7),
        max_bytes: 8,
        codec_version: Some(CodecVersion::V3),
        ..Default::default()
    });
    builder.build().unwrap()
}

/// Scenario 2: bounds clamp, strict=false — 150 clamps to 100 rather than
/// failing.
#[test]
fn bounds_clamp_when_not_strict() -> Result<()> {
    let mut engine = Engine::new();
    engine.set_strict(false);
    engine.load(clamped_field())?;

    let mut msg = Message::new();
    msg.set(1, FieldValue::I64(150));

    let bytes = engine.encode(7, &msg)?;
    let (_, decoded, _) = engine.decode(&bytes)?;
    assert_eq!(decoded.get(1).unwrap().as_f64().unwrap(), 100.0);
    Ok(())
}

/// Scenario 3: bounds reject, strict=true — the same out-of-range input
/// fails outright and nothing is written.
#[test]
fn bounds_reject_when_strict() {
    let mut engine = Engine::new();
    engine.set_strict(true);
    engine.load(clamped_field()).unwrap();

    let mut msg = Message::new();
    msg.set(1, FieldValue::I64(150));

    assert_matches!(
        engine.encode(7, &msg),
        Err(Error::OutOfRange { min, max, .. }) if min == 0.0 && max == 100.0
    );
}

/// Scenario 4: an optional field behind the `dccl.presence` decorator costs
/// exactly 1 body bit when absent and `1 + inner width` bits when present.
#[test]
fn presence_bit_cost_absent_vs_present() -> Result<()> {
    let mut f = FieldDescriptorBuilder::new(1, "reading");
    f.wire_kind(WireKind::Uint32)
        .label(Label::Optional)
        .options(FieldOptions {
            codec: Some("dccl.presence".to_string()),
            min: Some(0.0),
            max: Some(65535.0),
            precision: 0,
            ..Default::default()
        });
    let mut builder = MessageDescriptorBuilder::new("Reading");
    builder.add_field(f.build().unwrap()).options(MessageOptions {
        id: Some(9),
        max_bytes: 8,
        codec_version: Some(CodecVersion::V3),
        ..Default::default()
    });
    let descriptor = builder.build().unwrap();

    let mut engine = Engine::new();
    engine.load(descriptor)?;

    let absent = Message::new();
    let absent_bytes = engine.encode(9, &absent)?;
    // 1 id byte + 1 body byte (the presence bit padded to a byte).
    assert_eq!(absent_bytes.len(), 2);
    let (_, decoded, _) = engine.decode(&absent_bytes)?;
    assert!(!decoded.is_set(1));

    let mut present = Message::new();
    present.set(1, FieldValue::U64(40000));
    let present_bytes = engine.encode(9, &present)?;
    // 1 id byte + ceil((1 + 16) / 8) = 3 body bytes.
    assert_eq!(present_bytes.len(), 1 + 3);
    let (_, decoded, _) = engine.decode(&present_bytes)?;
    assert_eq!(decoded.get(1).unwrap().as_f64().unwrap(), 40000.0);
    Ok(())
}

/// Scenario 5: loading a second, structurally different descriptor under an
/// already-registered id fails; the first registration keeps working.
#[test]
fn id_collision_leaves_original_usable() -> Result<()> {
    let mut a = FieldDescriptorBuilder::new(1, "a");
    a.wire_kind(WireKind::Bool).label(Label::Required);
    let mut builder_a = MessageDescriptorBuilder::new("A");
    builder_a.add_field(a.build().unwrap()).options(MessageOptions {
        id: Some(5),
        max_bytes: 8,
        codec_version: Some(CodecVersion::V3),
        ..Default::default()
    });

    let mut b = FieldDescriptorBuilder::new(1, "b");
    b.wire_kind(WireKind::Bool).label(Label::Required);
    let mut c = FieldDescriptorBuilder::new(2, "c");
    c.wire_kind(WireKind::Bool).label(Label::Required);
    let mut builder_b = MessageDescriptorBuilder::new("B");
    builder_b
        .add_field(b.build().unwrap())
        .add_field(c.build().unwrap())
        .options(MessageOptions {
            id: Some(5),
            max_bytes: 8,
            codec_version: Some(CodecVersion::V3),
            ..Default::default()
        });

    let mut engine = Engine::new();
    engine.load(builder_a.build().unwrap())?;
    assert_matches!(engine.load(builder_b.build().unwrap()), Err(Error::IdCollision { id: 5 }));
    assert!(engine.is_loaded(5));

    let mut msg = Message::new();
    msg.set(1, FieldValue::Bool(true));
    let bytes = engine.encode(5, &msg)?;
    let (_, decoded, _) = engine.decode(&bytes)?;
    assert_eq!(decoded.get(1).unwrap().as_bool().unwrap(), true);
    Ok(())
}

/// Scenario 6: two peers load descriptors that differ only in a bound;
/// with a `dccl.hash` field present, the divergence is caught as
/// `HashMismatch` rather than silently misdecoding.
fn descriptor_with_hash(max: f64) -> dccl::MessageDescriptor {
    let mut value = FieldDescriptorBuilder::new(1, "value");
    value.wire_kind(WireKind::Int32).label(Label::Required).options(FieldOptions {
        min: Some(0.0),
        max: Some(max),
        precision: 0,
        ..Default::default()
    });
    let mut digest = FieldDescriptorBuilder::new(2, "schema_hash");
    digest.wire_kind(WireKind::Uint32).label(Label::Required).options(FieldOptions {
        codec: Some("dccl.hash".to_string()),
        min: Some(0.0),
        max: Some(65535.0),
        ..Default::default()
    });
    let mut builder = MessageDescriptorBuilder::new("Shared");
    builder
        .add_field(value.build().unwrap())
        .add_field(digest.build().unwrap())
        .options(MessageOptions {
            id: Some(11),
            max_bytes: 8,
            codec_version: Some(CodecVersion::V4),
            ..Default::default()
        });
    builder.build().unwrap()
}

#[test]
fn hash_field_catches_schema_divergence() -> Result<()> {
    let mut peer1 = Engine::new();
    peer1.load(descriptor_with_hash(100.0))?;
    let mut msg = Message::new();
    msg.set(1, FieldValue::I64(42));
    msg.set(2, FieldValue::U64(0)); // value is ignored by dccl.hash; it writes ctx.message_hash
    let bytes = peer1.encode(11, &msg)?;

    // 120 keeps the `value` field at the same bit width as 100 (both need
    // 7 bits), so the divergence is caught by the hash rather than by the
    // two descriptors disagreeing about how many bits `value` occupies.
    let mut peer2 = Engine::new();
    peer2.load(descriptor_with_hash(120.0))?;
    assert_matches!(peer2.decode(&bytes), Err(Error::HashMismatch { .. }));

    // Two engines loading the identical descriptor agree.
    let mut peer3 = Engine::new();
    peer3.load(descriptor_with_hash(100.0))?;
    let (_, decoded, _) = peer3.decode(&bytes)?;
    assert_eq!(decoded.get(1).unwrap().as_f64().unwrap(), 42.0);
    Ok(())
}

/// Hash stability: loading the identical descriptor twice (even under two
/// separate engines) yields the identical structural hash.
#[test]
fn hash_stability_across_engines() -> Result<()> {
    let mut e1 = Engine::new();
    let mut e2 = Engine::new();
    let h1 = e1.load(navigation_report())?;
    let h2 = e2.load(navigation_report())?;
    assert_eq!(h1, h2);
    Ok(())
}

fn point_descriptor() -> dccl::MessageDescriptor {
    let mut x = FieldDescriptorBuilder::new(1, "x");
    x.wire_kind(WireKind::Int32).label(Label::Required).options(FieldOptions {
        min: Some(0.0),
        max: Some(100.0),
        precision: 0,
        ..Default::default()
    });
    let mut y = FieldDescriptorBuilder::new(2, "y");
    y.wire_kind(WireKind::Int32).label(Label::Required).options(FieldOptions {
        min: Some(0.0),
        max: Some(100.0),
        precision: 0,
        ..Default::default()
    });
    let mut builder = MessageDescriptorBuilder::new("Point");
    builder.add_field(x.build().unwrap()).add_field(y.build().unwrap()).options(MessageOptions {
        max_bytes: 4,
        codec_version: Some(CodecVersion::V3),
        ..Default::default()
    });
    builder.build().unwrap()
}

fn point(x: i64, y: i64) -> Message {
    let mut m = Message::new();
    m.set(1, FieldValue::I64(x));
    m.set(2, FieldValue::I64(y));
    m
}

/// A required nested submessage, an optional one, and a repeated one
/// (max_repeat=3), all sharing the same nested descriptor. Exercises
/// `MessageFieldCodec`'s required-costs-nothing-extra / optional-presence-bit
/// / repeated-via-`RepeatedCodec` paths together.
fn path_descriptor() -> dccl::MessageDescriptor {
    let mut origin = FieldDescriptorBuilder::new(1, "origin");
    origin.wire_kind(WireKind::Message).label(Label::Required).nested_message(point_descriptor());
    let mut destination = FieldDescriptorBuilder::new(2, "destination");
    destination.wire_kind(WireKind::Message).label(Label::Optional).nested_message(point_descriptor());
    let mut waypoints = FieldDescriptorBuilder::new(3, "waypoints");
    waypoints
        .wire_kind(WireKind::Message)
        .label(Label::Repeated)
        .nested_message(point_descriptor())
        .options(FieldOptions {
            max_repeat: Some(3),
            ..Default::default()
        });

    let mut builder = MessageDescriptorBuilder::new("Path");
    builder
        .add_field(origin.build().unwrap())
        .add_field(destination.build().unwrap())
        .add_field(waypoints.build().unwrap())
        .options(MessageOptions {
            id: Some(42),
            max_bytes: 16,
            codec_version: Some(CodecVersion::V3),
            ..Default::default()
        });
    builder.build().unwrap()
}

#[test]
fn nested_message_fields_round_trip_required_optional_and_repeated() -> Result<()> {
    let mut engine = Engine::new();
    engine.load(path_descriptor())?;

    let mut msg = Message::new();
    msg.set(1, FieldValue::Message(point(1, 2)));
    msg.set(2, FieldValue::Message(point(3, 4)));
    msg.set(3, FieldValue::Repeated(vec![FieldValue::Message(point(5, 6)), FieldValue::Message(point(7, 8))]));

    let bytes = engine.encode(42, &msg)?;
    assert_eq!(bytes.len(), engine.size(42, &msg)?);

    let (id, decoded, consumed) = engine.decode(&bytes)?;
    assert_eq!(id, 42);
    assert_eq!(consumed, bytes.len());

    let origin = decoded.get(1).unwrap().as_message().unwrap();
    assert_eq!(origin.get(1).unwrap().as_f64().unwrap(), 1.0);
    assert_eq!(origin.get(2).unwrap().as_f64().unwrap(), 2.0);

    let destination = decoded.get(2).unwrap().as_message().unwrap();
    assert_eq!(destination.get(1).unwrap().as_f64().unwrap(), 3.0);

    let waypoints = decoded.get(3).unwrap().as_repeated().unwrap();
    assert_eq!(waypoints.len(), 2);
    assert_eq!(waypoints[0].as_message().unwrap().get(1).unwrap().as_f64().unwrap(), 5.0);
    assert_eq!(waypoints[1].as_message().unwrap().get(2).unwrap().as_f64().unwrap(), 8.0);
    Ok(())
}

/// An absent optional submessage costs exactly its presence bit; the
/// required submessage next to it costs nothing beyond its own encoding.
#[test]
fn absent_optional_nested_message_costs_only_its_presence_bit() -> Result<()> {
    let mut engine = Engine::new();
    engine.load(path_descriptor())?;

    let mut msg = Message::new();
    msg.set(1, FieldValue::Message(point(9, 9)));
    // destination left unset; waypoints left unset (treated as empty repeated).

    let bytes = engine.encode(42, &msg)?;
    let (_, decoded, _) = engine.decode(&bytes)?;
    assert!(!decoded.is_set(2));
    assert_eq!(decoded.get(3).unwrap().as_repeated().unwrap().len(), 0);
    Ok(())
}
