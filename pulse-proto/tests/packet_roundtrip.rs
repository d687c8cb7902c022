use pulse_proto::{pack_record, unpack_record, Arg, Header, Record, RecordPayload, HEADER_LEN};

#[test]
fn full_packet_with_multiple_records_round_trips() {
    let mut buf = vec![0u8; HEADER_LEN];
    let records = vec![
        Record {
            arg: Arg::new("eth0").unwrap(),
            payload: RecordPayload::Interface {
                ibytes: 1000,
                ipackets: 10,
                ierrs: 0,
                obytes: 2000,
                opackets: 20,
                oerrs: 1,
            },
        },
        Record {
            arg: Arg::new("sshd").unwrap(),
            payload: RecordPayload::Process {
                cnt: 2,
                utime_usec: 500_000,
                stime_usec: 10_000,
                rtime_usec: 600_000,
                cpu_pct: 3.5,
                mem_size: 8 << 20,
                mem_rss: 4 << 20,
            },
        },
    ];
    for r in &records {
        pack_record(&mut buf, 4096, r, 2).unwrap();
    }
    let total = buf.len();
    buf.resize(4096, 0);
    Header::finalize(&mut buf, total, 2, 42).unwrap();
    buf.truncate(total);

    let header = Header::validate(&buf, buf.len(), 2).unwrap();
    assert_eq!(header.timestamp, 42);

    let mut offset = HEADER_LEN;
    let mut decoded = Vec::new();
    while offset < header.length as usize {
        let (record, consumed) = unpack_record(&buf[offset..], header.version).unwrap();
        decoded.push(record);
        offset += consumed;
    }
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].arg.as_str().unwrap(), "eth0");
    assert_eq!(decoded[1].arg.as_str().unwrap(), "sshd");
}

#[test]
fn corrupted_packet_fails_validation_not_decoding() {
    let mut buf = vec![0u8; HEADER_LEN];
    let record = Record { arg: Arg::new("x").unwrap(), payload: RecordPayload::Test };
    pack_record(&mut buf, 64, &record, 2).unwrap();
    let total = buf.len();
    buf.resize(64, 0);
    Header::finalize(&mut buf, total, 2, 1).unwrap();
    buf.truncate(total);
    buf[total - 1] ^= 0xff;
    assert!(Header::validate(&buf, buf.len(), 2).is_err());
}
