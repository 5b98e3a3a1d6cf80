//! Property-based tests for frame encoding/decoding.
//!
//! These verify the wire codec for arbitrary inputs, not just fixtures:
//! every frame must round-trip exactly, and corrupting any byte between
//! the delimiters must make decoding fail.

use bytes::Bytes;
use econet_proto::{
    Frame, FrameType, Payload, address,
    payloads::{
        AlertsRange, FrameVersions, ParameterBatch, ParameterRange, ParameterValues,
        RegulatorData, ScheduleEntry, ScheduleGrid, SchedulesData, SetParameter,
    },
};
use proptest::prelude::*;

/// Strategy for an arbitrary frame-version table.
fn arbitrary_versions() -> impl Strategy<Value = FrameVersions> {
    prop::collection::vec((any::<u16>(), any::<u16>()), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for an arbitrary schedule grid.
fn arbitrary_grid() -> impl Strategy<Value = ScheduleGrid> {
    prop::collection::vec(any::<u64>(), 7).prop_map(|days| {
        let mut grid = ScheduleGrid::new();
        for (day, bits) in days.iter().enumerate() {
            for slot in 0..48 {
                grid.set(day, slot, bits >> slot & 1 != 0);
            }
        }
        grid
    })
}

/// Strategy for an ecoMAX parameter batch over the first few slots.
fn arbitrary_batch() -> impl Strategy<Value = ParameterBatch> {
    (0u8..4, prop::collection::vec(any::<Option<(u8, u8, u8)>>(), 0..8)).prop_map(
        |(start, slots)| {
            let count = slots.len() as u8;
            let values = slots
                .into_iter()
                .enumerate()
                .filter_map(|(i, triple)| {
                    let (value, min, max) = triple?;
                    // All-0xFF is the absent marker, not a value.
                    if value == 0xFF && min == 0xFF && max == 0xFF {
                        return None;
                    }
                    Some((
                        start + i as u8,
                        ParameterValues {
                            value: value.into(),
                            min: min.into(),
                            max: max.into(),
                        },
                    ))
                })
                .collect();
            ParameterBatch { start, count, values }
        },
    )
}

/// Strategy over a representative spread of payloads.
fn arbitrary_payload() -> impl Strategy<Value = Payload> {
    let empty_bodied = prop::sample::select(vec![
        Payload::CheckDeviceRequest,
        Payload::ProgramVersionRequest,
        Payload::UidRequest,
        Payload::SchedulesRequest,
        Payload::RegulatorDataSchemaRequest,
        Payload::StopMasterRequest,
        Payload::StartMasterRequest,
        Payload::SetEcomaxParameterResponse,
        Payload::SetScheduleResponse,
    ]);
    prop_oneof![
        empty_bodied,
        (any::<u8>(), any::<u8>())
            .prop_map(|(start, count)| Payload::EcomaxParametersRequest(ParameterRange {
                start,
                count
            })),
        (any::<u8>(), any::<u8>())
            .prop_map(|(start, count)| Payload::AlertsRequest(AlertsRange { start, count })),
        (0u8..70, any::<u8>()).prop_map(|(index, value)| Payload::SetEcomaxParameterRequest(
            SetParameter { index, value: value.into() }
        )),
        arbitrary_batch().prop_map(Payload::EcomaxParametersResponse),
        (arbitrary_versions(), prop::collection::vec(any::<u8>(), 0..64)).prop_map(
            |(versions, raw)| Payload::RegulatorData(RegulatorData {
                versions,
                raw: Bytes::from(raw)
            })
        ),
        (0u8..11, any::<u8>(), any::<u8>(), arbitrary_grid()).prop_map(
            |(id, switch, parameter, grid)| Payload::SetScheduleRequest(SchedulesData {
                schedules: vec![ScheduleEntry { id, switch, parameter, grid }],
            })
        ),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..32)).prop_filter_map(
            "only unregistered codes stay unknown",
            |(code, body)| {
                FrameType::from_wire(code).is_none().then(|| Payload::Unknown {
                    code,
                    body: Bytes::from(body),
                })
            }
        ),
    ]
}

/// Strategy for a full frame with arbitrary addressing.
fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (any::<u8>(), any::<u8>(), arbitrary_payload())
        .prop_map(|(recipient, sender, payload)| Frame::new(recipient, sender, payload))
}

#[test]
fn prop_frame_encode_decode_roundtrip() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.encode().expect("encode should succeed");
        let decoded = Frame::decode(&wire).expect("decode should succeed");

        // PROPERTY: round-trip must be identity.
        prop_assert_eq!(decoded, frame);
    });
}

#[test]
fn prop_encoding_is_stable() {
    proptest!(|(frame in arbitrary_frame())| {
        let first = frame.encode().expect("encode should succeed");
        let second = Frame::decode(&first)
            .expect("decode should succeed")
            .encode()
            .expect("re-encode should succeed");

        // PROPERTY: decode then encode reproduces the exact bytes.
        prop_assert_eq!(first, second);
    });
}

#[test]
fn prop_single_bit_corruption_is_detected() {
    proptest!(|(frame in arbitrary_frame(), offset in any::<prop::sample::Index>(), bit in 0u8..8)| {
        let wire = frame.encode().expect("encode should succeed");

        // Skip the delimiters themselves; the property covers every byte
        // in between.
        let inner = wire.len() - 2;
        let offset = 1 + offset.index(inner);
        let mut corrupted = wire.to_vec();
        corrupted[offset] ^= 1 << bit;

        // PROPERTY: flipping any single bit inside the frame makes decode
        // fail, or at minimum never yields the original frame silently.
        match Frame::decode(&corrupted) {
            Err(_) => {}
            Ok(decoded) => prop_assert_ne!(decoded, frame, "corruption at offset {} went unnoticed", offset),
        }
    });
}

#[test]
fn prop_frame_length_field_matches_wire_length() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.encode().expect("encode should succeed");
        let declared = u16::from_le_bytes([wire[1], wire[2]]);

        // PROPERTY: the length field counts the whole frame, delimiters
        // and CRC included.
        prop_assert_eq!(usize::from(declared), wire.len());
    });
}

#[test]
fn prop_addressing_is_preserved() {
    proptest!(|(recipient in any::<u8>(), sender in any::<u8>())| {
        let frame = Frame::new(recipient, sender, Payload::CheckDeviceRequest);
        let wire = frame.encode().expect("encode should succeed");
        let decoded = Frame::decode(&wire).expect("decode should succeed");

        prop_assert_eq!(decoded.recipient, recipient);
        prop_assert_eq!(decoded.sender, sender);
    });
}

#[test]
fn request_helper_addresses_the_controller() {
    let frame = Frame::request(Payload::UidRequest);
    assert_eq!(frame.recipient, address::ECOMAX);
    assert_eq!(frame.sender, address::ECONET);
}

#[test]
fn program_version_request_matches_the_reference_capture() {
    // Controller (0x45) asking the library (0x56) for its version:
    // start, length 10, recipient, sender, sender type, version, frame
    // type 0x40, XOR checksum, end.
    let wire = hex::decode("680a0056453005400416").expect("valid hex");

    let frame = Frame::decode(&wire).expect("capture should decode");
    assert_eq!(frame.recipient, address::ECONET);
    assert_eq!(frame.sender, address::ECOMAX);
    assert!(matches!(frame.payload, Payload::ProgramVersionRequest));

    assert_eq!(&frame.encode().expect("encode")[..], &wire[..]);
}
