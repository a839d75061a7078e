//! Diesel schema definitions for the antenna catalog and speed-test tables.

diesel::table! {
    use diesel::sql_types::*;

    bts_antennas (id) {
        id -> Int8,
        nom -> Nullable<Text>,
        latitude -> Float8,
        longitude -> Float8,
        wilaya -> Nullable<Text>,
        commune -> Nullable<Text>,
        cell_id_a -> Nullable<Text>,
        cell_id_b -> Nullable<Text>,
        cell_id_c -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    speed_tests (id) {
        id -> Int8,
        test_id -> Nullable<Text>,
        cell_id -> Nullable<Text>,
        download_mbps -> Nullable<Float8>,
        upload_mbps -> Nullable<Float8>,
        latency_ms -> Nullable<Float8>,
        jitter_ms -> Nullable<Float8>,
        network_type -> Nullable<Text>,
        signal_strength_dbm -> Nullable<Int4>,
        operator -> Nullable<Text>,
        device_type -> Nullable<Text>,
        wilaya -> Nullable<Text>,
        commune -> Nullable<Text>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        timestamp -> Timestamptz,
    }
}
