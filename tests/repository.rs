mod common;

mod shared {
    use crate::common;
    use obc_storage::error::Error;
    use obc_storage::sim::SimFram;
    use obc_storage::{Repository, Value, ValueKind};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    fn repository() -> Repository<common::Flash, SimFram> {
        let repository = Repository::new(common::Flash::new(16), SimFram::new(common::FRAM_SIZE));
        repository.init(&common::payload_config(8), true).unwrap();
        repository
    }

    #[test]
    fn operations_through_the_lock() {
        let repository = repository();

        assert_eq!(repository.init(&common::payload_config(8), false), Err(Error::AlreadyInitialized));
        repository.insert(&common::entry(10)).unwrap();
        assert_eq!(repository.get_by_time(10).unwrap(), common::entry(10));
        assert_eq!(repository.take(10).unwrap(), common::entry(10));
        assert_eq!(repository.lookup_by_time(10), Err(Error::NotFound));

        repository.set(1, 2.5f32).unwrap();
        assert_eq!(repository.get::<f32>(1).unwrap(), 2.5);

        assert_eq!(repository.add_sample(0, &common::sample(20, 1)).unwrap(), 0);
        let mut out = [0u8; 20];
        repository.get_recent_sample(0, 0, &mut out).unwrap();
        assert_eq!(out.to_vec(), common::sample(20, 1));
        assert_eq!(repository.payload_schema(0).unwrap(), common::temperature());

        repository.close();
        assert!(!repository.is_initialized());
        assert_eq!(repository.purge(0), Err(Error::NotInitialized));
    }

    #[test]
    fn blocks_are_never_torn() {
        let repository = Arc::new(repository());
        repository.set_values(0, &[Value::UInt32(0); 4]).unwrap();

        let writer = {
            let repository = Arc::clone(&repository);
            thread::spawn(move || {
                for round in 1..=200u32 {
                    repository.set_values(0, &[Value::UInt32(round); 4]).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let mut out = [Value::UInt32(0); 4];
            repository.get_values(0, ValueKind::UInt32, &mut out).unwrap();
            assert!(out.iter().all(|value| *value == out[0]));
        }
        writer.join().unwrap();

        let mut out = [Value::UInt32(0); 4];
        repository.get_values(0, ValueKind::UInt32, &mut out).unwrap();
        assert_eq!(out, [Value::UInt32(200); 4]);
    }

    #[test]
    fn concurrent_counters() {
        let repository = Arc::new(repository());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repository = Arc::clone(&repository);
                thread::spawn(move || {
                    for _ in 0..100 {
                        repository
                            .with(|engine| {
                                let value: u32 = engine.get(0)?;
                                engine.set(0, value + 1)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(repository.get::<u32>(0).unwrap(), 400);
    }

    #[test]
    fn concurrent_schedulers() {
        let repository = Arc::new(repository());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let repository = Arc::clone(&repository);
                thread::spawn(move || {
                    for round in 0..20 {
                        let time = worker * 1000 + round;
                        repository.insert(&common::entry(time)).unwrap();
                        assert_eq!(repository.take(time).unwrap(), common::entry(time));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let statistics = repository.flight_plan_statistics().unwrap();
        assert_eq!(statistics.live, 0);
        assert!(statistics.used_records <= statistics.records_per_section);
    }
}
