#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ember_core::U256;
use ember_evm::{
    errors::VMError,
    fork::{Fork, ForkSpec},
    precompiles,
};

const PLENTY_OF_GAS: u64 = 10_000_000;

#[test]
fn identity_returns_its_input() {
    let calldata = Bytes::from(vec![1, 2, 3, 4, 5]);
    let mut consumed = 0;
    let output = precompiles::identity(&calldata, PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(output, calldata);
    // 15 static + 3 for the single word
    assert_eq!(consumed, 18);
}

#[test]
fn sha2_256_of_empty_input() {
    let mut consumed = 0;
    let output = precompiles::sha2_256(&Bytes::new(), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(
        hex::encode(&output),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(consumed, 60);
}

#[test]
fn ripemd_160_of_empty_input_is_left_padded() {
    let mut consumed = 0;
    let output = precompiles::ripemd_160(&Bytes::new(), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(
        hex::encode(&output),
        "0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31"
    );
}

#[test]
fn ecrecover_known_vector() {
    let calldata = hex::decode(concat!(
        "456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3",
        "000000000000000000000000000000000000000000000000000000000000001c",
        "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608",
        "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada",
    ))
    .unwrap();
    let mut consumed = 0;
    let output =
        precompiles::ecrecover(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(
        hex::encode(&output),
        "0000000000000000000000007156526fbd7a3c72969b54f64e42c10fbb768c8a"
    );
    assert_eq!(consumed, 3000);
}

#[test]
fn ecrecover_with_bad_recovery_id_returns_empty() {
    let mut calldata = vec![0u8; 128];
    calldata[63] = 99; // not 27 or 28
    let mut consumed = 0;
    let output =
        precompiles::ecrecover(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert!(output.is_empty());
}

#[test]
fn modexp_small_values() {
    // 3 ** 2 mod 5 == 4
    let mut calldata = vec![0u8; 96];
    calldata[31] = 1; // base size
    calldata[63] = 1; // exponent size
    calldata[95] = 1; // modulus size
    calldata.extend_from_slice(&[3, 2, 5]);

    let mut consumed = 0;
    let output =
        precompiles::modexp(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(output, Bytes::from(vec![4u8]));
    // small inputs bottom out at the static cost
    assert_eq!(consumed, 200);
}

#[test]
fn modexp_zero_sizes_yield_empty_output() {
    let calldata = vec![0u8; 96];
    let mut consumed = 0;
    let output =
        precompiles::modexp(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert!(output.is_empty());
}

#[test]
fn ecadd_with_identity_points() {
    let spec = ForkSpec::new(Fork::Cancun);

    // (0,0) + (0,0) = (0,0)
    let mut consumed = 0;
    let output = precompiles::ecadd(
        &Bytes::from(vec![0u8; 128]),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    )
    .unwrap();
    assert_eq!(output, Bytes::from(vec![0u8; 64]));
    assert_eq!(consumed, 150);

    // (1,2) + (0,0) = (1,2); the generator is on the curve
    let mut calldata = vec![0u8; 128];
    calldata[31] = 1;
    calldata[63] = 2;
    let mut consumed = 0;
    let output = precompiles::ecadd(
        &Bytes::from(calldata),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    )
    .unwrap();
    assert_eq!(output[31], 1);
    assert_eq!(output[63], 2);
}

#[test]
fn ecadd_rejects_points_off_the_curve() {
    let spec = ForkSpec::new(Fork::Cancun);
    let mut calldata = vec![0u8; 128];
    calldata[31] = 1;
    calldata[63] = 3; // (1, 3) is not on y^2 = x^3 + 3
    let mut consumed = 0;
    let result = precompiles::ecadd(
        &Bytes::from(calldata),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    );
    assert!(result.is_err());
}

#[test]
fn ecmul_by_zero_scalar_is_the_identity() {
    let spec = ForkSpec::new(Fork::Cancun);
    let mut calldata = vec![0u8; 96];
    calldata[31] = 1;
    calldata[63] = 2;
    // scalar stays zero
    let mut consumed = 0;
    let output = precompiles::ecmul(
        &Bytes::from(calldata),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    )
    .unwrap();
    assert_eq!(output, Bytes::from(vec![0u8; 64]));
    assert_eq!(consumed, 6000);
}

#[test]
fn ecmul_by_one_returns_the_point() {
    let spec = ForkSpec::new(Fork::Cancun);
    let mut calldata = vec![0u8; 96];
    calldata[31] = 1;
    calldata[63] = 2;
    calldata[95] = 1;
    let mut consumed = 0;
    let output = precompiles::ecmul(
        &Bytes::from(calldata),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    )
    .unwrap();
    assert_eq!(output[31], 1);
    assert_eq!(output[63], 2);
}

#[test]
fn ecpairing_of_empty_input_is_one() {
    let spec = ForkSpec::new(Fork::Cancun);
    let mut consumed = 0;
    let output =
        precompiles::ecpairing(&Bytes::new(), PLENTY_OF_GAS, &mut consumed, &spec).unwrap();
    assert_eq!(U256::from_big_endian(&output), U256::one());
    assert_eq!(consumed, 45000);
}

#[test]
fn ecpairing_rejects_truncated_input() {
    let spec = ForkSpec::new(Fork::Cancun);
    let mut consumed = 0;
    let result = precompiles::ecpairing(
        &Bytes::from(vec![0u8; 100]),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    );
    assert!(result.is_err());
}

#[test]
fn ecpairing_with_infinity_pairs_succeeds() {
    // a single all-zero group: both points at infinity, product is one
    let spec = ForkSpec::new(Fork::Cancun);
    let mut consumed = 0;
    let output = precompiles::ecpairing(
        &Bytes::from(vec![0u8; 192]),
        PLENTY_OF_GAS,
        &mut consumed,
        &spec,
    )
    .unwrap();
    assert_eq!(U256::from_big_endian(&output), U256::one());
    assert_eq!(consumed, 45000 + 34000);
}

#[test]
fn blake2f_eip152_vector() {
    let calldata = hex::decode(concat!(
        "0000000c",
        "48c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5",
        "d182e6ad7f520e511f6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b",
        "6162630000000000000000000000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000000000000000000000000000",
        "0000000000000000000000000000000000000000000000000000000000000000",
        "0300000000000000",
        "0000000000000000",
        "01",
    ))
    .unwrap();

    let mut consumed = 0;
    let output =
        precompiles::blake2f(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).unwrap();
    assert_eq!(
        hex::encode(&output),
        concat!(
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1",
            "7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        )
    );
    assert_eq!(consumed, 12);
}

#[test]
fn blake2f_rejects_bad_lengths_and_flags() {
    let mut consumed = 0;
    assert!(precompiles::blake2f(&Bytes::from(vec![0u8; 212]), PLENTY_OF_GAS, &mut consumed).is_err());

    let mut calldata = vec![0u8; 213];
    calldata[212] = 2; // final-block flag must be 0 or 1
    let mut consumed = 0;
    assert!(precompiles::blake2f(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed).is_err());
}

#[test]
fn point_evaluation_rejects_bad_input_shape() {
    let mut consumed = 0;
    let result =
        precompiles::point_evaluation(&Bytes::from(vec![0u8; 191]), PLENTY_OF_GAS, &mut consumed);
    assert!(result.is_err());
}

#[test]
fn point_evaluation_rejects_mismatched_versioned_hash() {
    // correct length, but the versioned hash does not commit to the
    // commitment bytes
    let calldata = vec![0u8; 192];
    let mut consumed = 0;
    let result =
        precompiles::point_evaluation(&Bytes::from(calldata), PLENTY_OF_GAS, &mut consumed);
    assert!(matches!(
        result,
        Err(VMError::PrecompileError(
            ember_evm::errors::PrecompileError::BlobVersionedHashMismatch
        ))
    ));
    // the gas was still charged before verification
    assert_eq!(consumed, 50000);
}

#[test]
fn precompile_without_enough_gas_fails() {
    let mut consumed = 0;
    let result = precompiles::sha2_256(&Bytes::new(), 10, &mut consumed);
    assert!(matches!(
        result,
        Err(VMError::PrecompileError(
            ember_evm::errors::PrecompileError::NotEnoughGas
        ))
    ));
}

#[test]
fn precompile_gating_follows_the_fork() {
    use ember_evm::precompiles::{
        is_precompile, BLAKE2F_ADDRESS, ECRECOVER_ADDRESS, MODEXP_ADDRESS,
        POINT_EVALUATION_ADDRESS,
    };

    let homestead = ForkSpec::new(Fork::Homestead);
    let istanbul = ForkSpec::new(Fork::Istanbul);
    let cancun = ForkSpec::new(Fork::Cancun);

    assert!(is_precompile(&ECRECOVER_ADDRESS, &homestead));
    assert!(!is_precompile(&MODEXP_ADDRESS, &homestead));
    assert!(!is_precompile(&BLAKE2F_ADDRESS, &homestead));
    assert!(is_precompile(&BLAKE2F_ADDRESS, &istanbul));
    assert!(!is_precompile(&POINT_EVALUATION_ADDRESS, &istanbul));
    assert!(is_precompile(&POINT_EVALUATION_ADDRESS, &cancun));
}
