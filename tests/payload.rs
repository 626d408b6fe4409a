mod common;

mod address {
    use crate::common;
    use obc_storage::error::Error;
    use pretty_assertions::assert_eq;

    const TEMPERATURE: usize = 0;
    const IMAGE: usize = 1;

    #[test]
    fn layout() {
        let engine = common::engine(&common::payload_config(8));
        let layout = engine.layout().unwrap();

        assert_eq!(layout.flight_plan, vec![0, 2048]);
        assert_eq!(layout.payloads, vec![4096, 6144, 8192, 10240]);
        assert_eq!(layout.payload_sections(IMAGE), Some(&[8192, 10240][..]));
        assert_eq!(layout.payload_sections(2), None);
        assert_eq!(layout.end, 12288);
        assert_eq!(layout.section_count(), 6);
    }

    #[test]
    fn samples_never_cross_a_page() {
        let engine = common::engine(&common::payload_config(8));

        assert_eq!(engine.sample_address(TEMPERATURE, 0).unwrap(), 4096);
        assert_eq!(engine.sample_address(TEMPERATURE, 24).unwrap(), 4096 + 24 * 20);
        // 24 bytes left in the page are skipped
        assert_eq!(engine.sample_address(TEMPERATURE, 25).unwrap(), 4096 + 512);
        assert_eq!(engine.sample_address(TEMPERATURE, 99).unwrap(), 4096 + 3 * 512 + 24 * 20);
    }

    #[test]
    fn second_section_of_a_payload() {
        let engine = common::engine(&common::payload_config(8));

        assert_eq!(engine.sample_address(TEMPERATURE, 100).unwrap(), 6144);
        assert_eq!(engine.sample_address(TEMPERATURE, 126).unwrap(), 6144 + 512 + 20);
        assert_eq!(engine.sample_address(TEMPERATURE, 199).unwrap(), 6144 + 3 * 512 + 24 * 20);
    }

    #[test]
    fn page_sized_samples() {
        let engine = common::engine(&common::payload_config(8));

        assert_eq!(engine.sample_address(IMAGE, 0).unwrap(), 8192);
        assert_eq!(engine.sample_address(IMAGE, 3).unwrap(), 8192 + 1536);
        assert_eq!(engine.sample_address(IMAGE, 4).unwrap(), 10240);
        assert_eq!(engine.sample_address(IMAGE, 7).unwrap(), 10240 + 1536);
    }

    #[test]
    fn out_of_bounds() {
        let mut engine = common::engine(&common::payload_config(8));

        assert_eq!(engine.sample_address(TEMPERATURE, 200), Err(Error::OutOfBounds));
        assert_eq!(engine.sample_address(IMAGE, 8), Err(Error::OutOfBounds));
        assert_eq!(engine.sample_address(IMAGE, u32::MAX), Err(Error::OutOfBounds));
        assert_eq!(engine.sample_address(2, 0), Err(Error::UnknownPayload));

        let writes = engine.media().flash().writes();
        assert_eq!(
            engine.set_sample(IMAGE, 8, &common::sample(512, 1)),
            Err(Error::OutOfBounds)
        );
        assert_eq!(engine.media().flash().writes(), writes);
    }

    #[test]
    fn sample_larger_than_a_page() {
        let config = common::config(8).with_payloads(
            vec![obc_storage::PayloadSchema::new("spectrum", 513, common::TEMPERATURE_INDEX)],
            1,
        );
        let mut engine = common::engine(&config);

        assert_eq!(engine.sample_address(0, 0), Err(Error::SampleTooLarge));
        assert_eq!(
            engine.set_sample(0, 0, &common::sample(513, 0)),
            Err(Error::SampleTooLarge)
        );
    }
}

mod samples {
    use crate::common;
    use obc_storage::error::Error;
    use pretty_assertions::assert_eq;

    const TEMPERATURE: usize = 0;
    const IMAGE: usize = 1;

    #[test]
    fn set_and_get() {
        let mut engine = common::engine(&common::payload_config(8));
        let first = common::sample(20, 0);
        let second = common::sample(20, 100);

        engine.set_sample(TEMPERATURE, 24, &first).unwrap();
        engine.set_sample(TEMPERATURE, 25, &second).unwrap();

        let mut out = [0u8; 20];
        engine.get_sample(TEMPERATURE, 24, &mut out).unwrap();
        assert_eq!(out.to_vec(), first);
        engine.get_sample(TEMPERATURE, 25, &mut out).unwrap();
        assert_eq!(out.to_vec(), second);

        let image = common::sample(512, 7);
        engine.set_sample(IMAGE, 5, &image).unwrap();
        let mut out = vec![0u8; 512];
        engine.get_sample(IMAGE, 5, &mut out).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn size_mismatch() {
        let mut engine = common::engine(&common::payload_config(8));

        assert_eq!(
            engine.set_sample(TEMPERATURE, 0, &[0u8; 19]),
            Err(Error::SampleSizeMismatch)
        );
        let mut out = [0u8; 21];
        assert_eq!(
            engine.get_sample(TEMPERATURE, 0, &mut out),
            Err(Error::SampleSizeMismatch)
        );
    }

    #[test]
    fn reset_one_table() {
        let mut engine = common::engine(&common::payload_config(8));
        let temperature = common::sample(20, 3);
        let image = common::sample(512, 9);
        engine.set_sample(TEMPERATURE, 150, &temperature).unwrap();
        engine.set_sample(IMAGE, 0, &image).unwrap();
        engine.insert(&common::entry(10)).unwrap();

        engine.reset_payload(TEMPERATURE).unwrap();

        let mut out = [0u8; 20];
        engine.get_sample(TEMPERATURE, 150, &mut out).unwrap();
        assert_eq!(out, [0xffu8; 20]);

        let mut out = vec![0u8; 512];
        engine.get_sample(IMAGE, 0, &mut out).unwrap();
        assert_eq!(out, image);
        assert_eq!(engine.get_by_time(10).unwrap(), common::entry(10));
        assert_eq!(engine.reset_payload(2), Err(Error::UnknownPayload));
    }

    #[test]
    fn reset_all_tables() {
        let mut engine = common::engine(&common::payload_config(8));
        engine.set_sample(TEMPERATURE, 0, &common::sample(20, 3)).unwrap();
        engine.set_sample(IMAGE, 7, &common::sample(512, 9)).unwrap();

        let erases = engine.media().flash().erases();
        engine.reset_payloads().unwrap();
        assert_eq!(engine.media().flash().erases(), erases + 4);
        assert!(engine.media().flash().as_bytes()[4096..12288].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn add_and_recent() {
        let mut engine = common::engine(&common::payload_config(8));
        let samples: Vec<Vec<u8>> = (0..3).map(|i| common::sample(20, i * 10)).collect();

        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(engine.add_sample(TEMPERATURE, sample).unwrap(), i as u32);
        }
        assert_eq!(engine.get::<u32>(common::TEMPERATURE_INDEX).unwrap(), 3);

        let mut out = [0u8; 20];
        engine.get_recent_sample(TEMPERATURE, 0, &mut out).unwrap();
        assert_eq!(out.to_vec(), samples[2]);
        engine.get_recent_sample(TEMPERATURE, 2, &mut out).unwrap();
        assert_eq!(out.to_vec(), samples[0]);
        assert_eq!(
            engine.get_recent_sample(TEMPERATURE, 3, &mut out),
            Err(Error::NotFound)
        );

        // the image counter is independent
        assert_eq!(
            engine.get_recent_sample(IMAGE, 0, &mut [0u8; 512]),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn failed_add_keeps_the_counter() {
        let mut engine = common::engine(&common::payload_config(8));
        engine.set(common::IMAGE_INDEX, 8u32).unwrap();

        assert_eq!(
            engine.add_sample(IMAGE, &common::sample(512, 0)),
            Err(Error::OutOfBounds)
        );
        assert_eq!(engine.get::<u32>(common::IMAGE_INDEX).unwrap(), 8);
    }

    #[test]
    fn delete_memory_sections() {
        let mut engine = common::engine(&common::payload_config(8));
        engine.add_sample(TEMPERATURE, &common::sample(20, 1)).unwrap();
        engine.add_sample(IMAGE, &common::sample(512, 1)).unwrap();
        engine.insert(&common::entry(10)).unwrap();
        engine.set(0, 77u32).unwrap();

        engine.delete_memory_sections().unwrap();

        assert_eq!(engine.get::<u32>(common::TEMPERATURE_INDEX).unwrap(), 0);
        assert_eq!(engine.get::<u32>(common::IMAGE_INDEX).unwrap(), 0);
        assert_eq!(engine.get::<u32>(0).unwrap(), 77);
        assert_eq!(engine.lookup_by_time(10), Err(Error::NotFound));
        assert!(engine.media().flash().as_bytes()[..12288].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn schemas() {
        let engine = common::engine(&common::payload_config(8));
        assert_eq!(engine.payload_schema(TEMPERATURE).unwrap(), &common::temperature());
        assert_eq!(engine.payload_schema(IMAGE).unwrap().record_size, 512);
        assert_eq!(engine.payload_schema(2), Err(Error::UnknownPayload));
    }

    #[test]
    fn index_variable_must_exist() {
        let config = common::config(8).with_payloads(
            vec![obc_storage::PayloadSchema::new("gps", 16, common::STATUS_VARIABLES)],
            1,
        );
        let mut engine = obc_storage::Engine::new(
            common::Flash::new(16),
            obc_storage::sim::SimFram::new(common::FRAM_SIZE),
        );
        assert_eq!(engine.init(&config, true), Err(obc_storage::error::Error::InvalidLayout));
    }
}
