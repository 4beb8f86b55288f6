use bytes::Bytes;
use ember_core::{Address, H160, U256};
use keccak_hash::keccak256;
use kzg_rs::{Bytes32, Bytes48, KzgProof};
use lambdaworks_math::{
    cyclic_group::IsGroup,
    elliptic_curve::{
        short_weierstrass::{
            curves::bn_254::{
                curve::{BN254Curve, BN254FieldElement},
                field_extension::{Degree12ExtensionField, Degree2ExtensionField},
                pairing::BN254AtePairing,
                twist::BN254TwistCurve,
            },
            point::ShortWeierstrassProjectivePoint,
        },
        traits::{IsEllipticCurve, IsPairing},
    },
    field::element::FieldElement,
    traits::ByteConversion,
    unsigned_integer::element::U256 as LambdaworksU256,
};
use libsecp256k1::{Message, RecoveryId, Signature};
use num_bigint::BigUint;
use sha2::Digest;

use crate::{
    call_frame::CallFrame,
    constants::VERSIONED_HASH_VERSION_KZG,
    errors::{InternalError, OutOfGasError, PrecompileError, VMError},
    fork::ForkSpec,
    gas_cost::{
        self, identity as identity_cost, modexp as modexp_cost, ripemd_160 as ripemd_160_cost,
        sha2_256 as sha2_256_cost, BLAKE2F_ROUND_COST, ECRECOVER_COST, MODEXP_STATIC_COST,
        POINT_EVALUATION_COST,
    },
    vm::VM,
};

pub const ECRECOVER_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x01,
]);
pub const SHA2_256_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x02,
]);
pub const RIPEMD_160_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x03,
]);
pub const IDENTITY_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x04,
]);
pub const MODEXP_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x05,
]);
pub const ECADD_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x06,
]);
pub const ECMUL_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x07,
]);
pub const ECPAIRING_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x08,
]);
pub const BLAKE2F_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x09,
]);
pub const POINT_EVALUATION_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x0a,
]);

pub const PRECOMPILES: [H160; 10] = [
    ECRECOVER_ADDRESS,
    SHA2_256_ADDRESS,
    RIPEMD_160_ADDRESS,
    IDENTITY_ADDRESS,
    MODEXP_ADDRESS,
    ECADD_ADDRESS,
    ECMUL_ADDRESS,
    ECPAIRING_ADDRESS,
    BLAKE2F_ADDRESS,
    POINT_EVALUATION_ADDRESS,
];

/// BN254 base field modulus.
const ALT_BN128_PRIME: LambdaworksU256 = LambdaworksU256::from_hex_unchecked(
    "30644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd47",
);
/// BN254 group order.
const ALT_BN128_ORDER: LambdaworksU256 = LambdaworksU256::from_hex_unchecked(
    "30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001",
);

/// BLS12-381 scalar field modulus, second half of the point-evaluation
/// output (EIP-4844).
const BLS_MODULUS: &[u8; 32] = &[
    0x73, 0xed, 0xa7, 0x53, 0x29, 0x9d, 0x7d, 0x48, 0x33, 0x39, 0xd8, 0x08, 0x09, 0xa1, 0xd8, 0x05,
    0x53, 0xbd, 0xa4, 0x02, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01,
];
const FIELD_ELEMENTS_PER_BLOB: u64 = 4096;

/// Which built-in lives at the address under the active fork, if any.
/// The last two precompiles are gated by hardfork: BLAKE2F arrived in
/// Istanbul, point evaluation in Cancun; MODEXP and the BN254 trio in
/// Byzantium.
pub fn is_precompile(callee_address: &Address, spec: &ForkSpec) -> bool {
    match *callee_address {
        address if address == ECRECOVER_ADDRESS => true,
        address if address == SHA2_256_ADDRESS => true,
        address if address == RIPEMD_160_ADDRESS => true,
        address if address == IDENTITY_ADDRESS => true,
        address if address == MODEXP_ADDRESS => spec.eip198,
        address if address == ECADD_ADDRESS => spec.eip196,
        address if address == ECMUL_ADDRESS => spec.eip196,
        address if address == ECPAIRING_ADDRESS => spec.eip197,
        address if address == BLAKE2F_ADDRESS => spec.eip152,
        address if address == POINT_EVALUATION_ADDRESS => spec.eip4844,
        _ => false,
    }
}

pub fn execute_precompile(vm: &mut VM, current_call_frame: &mut CallFrame) -> Result<Bytes, VMError> {
    let callee_address = current_call_frame.code_address;
    let calldata = current_call_frame.calldata.clone();
    let gas_for_call = current_call_frame.gas_limit;
    let spec = vm.spec.clone();
    let consumed_gas = &mut current_call_frame.gas_used;

    let result = match callee_address {
        address if address == ECRECOVER_ADDRESS => {
            ecrecover(&calldata, gas_for_call, consumed_gas)?
        }
        address if address == IDENTITY_ADDRESS => identity(&calldata, gas_for_call, consumed_gas)?,
        address if address == SHA2_256_ADDRESS => sha2_256(&calldata, gas_for_call, consumed_gas)?,
        address if address == RIPEMD_160_ADDRESS => {
            ripemd_160(&calldata, gas_for_call, consumed_gas)?
        }
        address if address == MODEXP_ADDRESS => modexp(&calldata, gas_for_call, consumed_gas)?,
        address if address == ECADD_ADDRESS => {
            ecadd(&calldata, gas_for_call, consumed_gas, &spec)?
        }
        address if address == ECMUL_ADDRESS => {
            ecmul(&calldata, gas_for_call, consumed_gas, &spec)?
        }
        address if address == ECPAIRING_ADDRESS => {
            ecpairing(&calldata, gas_for_call, consumed_gas, &spec)?
        }
        address if address == BLAKE2F_ADDRESS => blake2f(&calldata, gas_for_call, consumed_gas)?,
        address if address == POINT_EVALUATION_ADDRESS => {
            point_evaluation(&calldata, gas_for_call, consumed_gas)?
        }
        _ => return Err(VMError::Internal(InternalError::InvalidPrecompileAddress)),
    };

    Ok(result)
}

/// Verifies that the gas cost fits into the forwarded gas and consumes it.
fn increase_precompile_consumed_gas(
    gas_for_call: u64,
    gas_cost: u64,
    consumed_gas: &mut u64,
) -> Result<(), VMError> {
    let potential_consumed_gas = consumed_gas
        .checked_add(gas_cost)
        .ok_or(PrecompileError::GasConsumedOverflow)?;
    if potential_consumed_gas > gas_for_call {
        return Err(VMError::PrecompileError(PrecompileError::NotEnoughGas));
    }
    *consumed_gas = potential_consumed_gas;
    Ok(())
}

/// When the slice is shorter than `target_len` the rest reads as zeros;
/// excess bytes are preserved as-is (callers slice what they need).
fn fill_with_zeros(calldata: &Bytes, target_len: usize) -> Result<Bytes, VMError> {
    let mut padded_calldata = calldata.to_vec();
    if padded_calldata.len() < target_len {
        let size_diff = target_len
            .checked_sub(padded_calldata.len())
            .ok_or(InternalError::ArithmeticOperationUnderflow)?;
        padded_calldata.extend(vec![0u8; size_diff]);
    }
    Ok(padded_calldata.into())
}

/// ECDSA public key recovery (address 0x01).
pub fn ecrecover(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_for_call, ECRECOVER_COST, consumed_gas)?;

    let calldata = fill_with_zeros(calldata, 128)?;

    let hash = calldata.get(0..32).ok_or(InternalError::SlicingError)?;
    let message = Message::parse_slice(hash).map_err(|_| PrecompileError::ParsingInputError)?;

    let v = U256::from_big_endian(calldata.get(32..64).ok_or(InternalError::SlicingError)?);

    // the recovery identifier must be exactly 27 or 28
    if !(v == U256::from(27) || v == U256::from(28)) {
        return Ok(Bytes::new());
    }
    let v = u8::try_from(v).map_err(|_| InternalError::ConversionError)?;
    let recovery_id = match RecoveryId::parse_rpc(v) {
        Ok(id) => id,
        Err(_) => {
            return Ok(Bytes::new());
        }
    };

    let sig = calldata.get(64..128).ok_or(InternalError::SlicingError)?;
    let signature = match Signature::parse_standard_slice(sig) {
        Ok(signature) => signature,
        Err(_) => {
            return Ok(Bytes::new());
        }
    };

    let mut public_key = match libsecp256k1::recover(&message, &signature, &recovery_id) {
        Ok(public_key) => public_key,
        Err(_) => {
            return Ok(Bytes::new());
        }
    }
    .serialize();

    // keccak of the 64-byte key; the address is its low 20 bytes
    keccak256(public_key.get_mut(1..65).ok_or(InternalError::SlicingError)?);

    let mut output = vec![0u8; 12];
    output.extend_from_slice(public_key.get(13..33).ok_or(InternalError::SlicingError)?);

    Ok(Bytes::from(output))
}

/// Returns the received input unchanged (address 0x04).
pub fn identity(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    let gas_cost = identity_cost(calldata.len())?;
    increase_precompile_consumed_gas(gas_for_call, gas_cost, consumed_gas)?;
    Ok(calldata.clone())
}

/// SHA-256 of the input (address 0x02).
pub fn sha2_256(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    let gas_cost = sha2_256_cost(calldata.len())?;
    increase_precompile_consumed_gas(gas_for_call, gas_cost, consumed_gas)?;

    let result = sha2::Sha256::digest(calldata).to_vec();
    Ok(Bytes::from(result))
}

/// RIPEMD-160 of the input, left-padded to 32 bytes (address 0x03).
pub fn ripemd_160(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    let gas_cost = ripemd_160_cost(calldata.len())?;
    increase_precompile_consumed_gas(gas_for_call, gas_cost, consumed_gas)?;

    let mut hasher = ripemd::Ripemd160::new();
    hasher.update(calldata);
    let result = hasher.finalize();

    let mut output = vec![0; 12];
    output.extend_from_slice(&result);

    Ok(Bytes::from(output))
}

/// Arbitrary-precision modular exponentiation (address 0x05, EIP-198,
/// priced per EIP-2565).
pub fn modexp(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    let calldata = fill_with_zeros(calldata, 96)?;

    let b_size = U256::from_big_endian(
        calldata
            .get(0..32)
            .ok_or(PrecompileError::ParsingInputError)?,
    );
    let e_size = U256::from_big_endian(
        calldata
            .get(32..64)
            .ok_or(PrecompileError::ParsingInputError)?,
    );
    let m_size = U256::from_big_endian(
        calldata
            .get(64..96)
            .ok_or(PrecompileError::ParsingInputError)?,
    );

    if b_size.is_zero() && m_size.is_zero() {
        increase_precompile_consumed_gas(gas_for_call, MODEXP_STATIC_COST, consumed_gas)?;
        return Ok(Bytes::new());
    }

    // conversions could explode before the zero-size shortcut above
    let b_size = usize::try_from(b_size).map_err(|_| PrecompileError::ParsingInputError)?;
    let e_size = usize::try_from(e_size).map_err(|_| PrecompileError::ParsingInputError)?;
    let m_size = usize::try_from(m_size).map_err(|_| PrecompileError::ParsingInputError)?;

    let base_limit = b_size
        .checked_add(96)
        .ok_or(InternalError::ArithmeticOperationOverflow)?;
    let exponent_limit = e_size
        .checked_add(base_limit)
        .ok_or(InternalError::ArithmeticOperationOverflow)?;

    // data beyond the calldata reads as zeros, on the right
    let b = calldata.get(96..base_limit.min(calldata.len())).unwrap_or_default();
    let b = fill_with_zeros(&Bytes::from(b.to_vec()), b_size)?;
    let base = BigUint::from_bytes_be(&b);

    let e = calldata
        .get(base_limit.min(calldata.len())..exponent_limit.min(calldata.len()))
        .unwrap_or_default();
    let e = fill_with_zeros(&Bytes::from(e.to_vec()), e_size)?;
    let exponent = BigUint::from_bytes_be(&e);

    let m = match calldata.get(exponent_limit..) {
        Some(m) => {
            let m_extended = fill_with_zeros(&Bytes::from(m.to_vec()), m_size)?;
            m_extended.get(..m_size).unwrap_or_default().to_vec()
        }
        None => Default::default(),
    };
    let modulus = BigUint::from_bytes_be(&m);

    // the pricing formula reads at most the first 32 bytes of the exponent
    let exponent_head = if e_size <= 32 {
        U256::from_big_endian(&e)
    } else {
        U256::from_big_endian(e.get(..32).ok_or(InternalError::SlicingError)?)
    };

    let gas_cost = modexp_cost(exponent_head, b_size, e_size, m_size)?;
    increase_precompile_consumed_gas(gas_for_call, gas_cost, consumed_gas)?;

    let result = mod_exp(base, exponent, modulus);

    let res_bytes = result.to_bytes_be();
    let res_bytes = increase_left_pad(&Bytes::from(res_bytes), m_size)?;

    Ok(res_bytes.slice(..m_size))
}

/// The modulus can never be zero here, that case returns early above.
#[allow(clippy::arithmetic_side_effects)]
fn mod_exp(base: BigUint, exponent: BigUint, modulus: BigUint) -> BigUint {
    if modulus == BigUint::ZERO {
        BigUint::ZERO
    } else if exponent == BigUint::ZERO {
        BigUint::from(1_u8) % modulus
    } else {
        base.modpow(&exponent, &modulus)
    }
}

pub fn increase_left_pad(result: &Bytes, m_size: usize) -> Result<Bytes, VMError> {
    if result.len() < m_size {
        let mut padded_result = vec![0u8; m_size];
        let size_diff = m_size
            .checked_sub(result.len())
            .ok_or(InternalError::ArithmeticOperationUnderflow)?;
        padded_result
            .get_mut(size_diff..)
            .ok_or(InternalError::SlicingError)?
            .copy_from_slice(result);
        Ok(padded_result.into())
    } else {
        Ok(result.clone())
    }
}

/// Parses a BN254 base field element, rejecting values at or above the
/// field modulus as EIP-196 requires.
fn parse_bn254_coordinate(bytes: &[u8]) -> Result<BN254FieldElement, VMError> {
    let raw = LambdaworksU256::from_bytes_be(bytes)
        .map_err(|_| PrecompileError::ParsingInputError)?;
    if raw >= ALT_BN128_PRIME {
        return Err(VMError::PrecompileError(PrecompileError::ParsingInputError));
    }
    BN254FieldElement::from_bytes_be(bytes).map_err(|_| {
        VMError::PrecompileError(PrecompileError::ParsingInputError)
    })
}

/// BN254 point addition (address 0x06, EIP-196).
pub fn ecadd(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
    spec: &ForkSpec,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_for_call, gas_cost::ecadd(spec), consumed_gas)?;

    let calldata = fill_with_zeros(calldata, 128)?;

    let first_point_x =
        parse_bn254_coordinate(calldata.get(0..32).ok_or(InternalError::SlicingError)?)?;
    let first_point_y =
        parse_bn254_coordinate(calldata.get(32..64).ok_or(InternalError::SlicingError)?)?;
    let second_point_x =
        parse_bn254_coordinate(calldata.get(64..96).ok_or(InternalError::SlicingError)?)?;
    let second_point_y =
        parse_bn254_coordinate(calldata.get(96..128).ok_or(InternalError::SlicingError)?)?;

    // the conversion in create_point_from_affine rejects (0, 0), so the
    // point at infinity is special-cased before it
    let point_zero = BN254FieldElement::from(0);
    let first_point_is_zero = first_point_x.eq(&point_zero) && first_point_y.eq(&point_zero);
    let second_point_is_zero = second_point_x.eq(&point_zero) && second_point_y.eq(&point_zero);

    if first_point_is_zero && second_point_is_zero {
        return Ok(Bytes::from([0u8; 64].to_vec()));
    }
    if first_point_is_zero {
        let second_point = BN254Curve::create_point_from_affine(second_point_x, second_point_y)
            .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;
        return Ok(affine_point_to_bytes(&second_point));
    }
    if second_point_is_zero {
        let first_point = BN254Curve::create_point_from_affine(first_point_x, first_point_y)
            .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;
        return Ok(affine_point_to_bytes(&first_point));
    }

    let first_point = BN254Curve::create_point_from_affine(first_point_x, first_point_y)
        .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;
    let second_point = BN254Curve::create_point_from_affine(second_point_x, second_point_y)
        .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;

    let sum = first_point.operate_with(&second_point);
    if sum.is_neutral_element() {
        Ok(Bytes::from([0u8; 64].to_vec()))
    } else {
        Ok(affine_point_to_bytes(&sum.to_affine()))
    }
}

/// BN254 scalar multiplication (address 0x07, EIP-196).
pub fn ecmul(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
    spec: &ForkSpec,
) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(gas_for_call, gas_cost::ecmul(spec), consumed_gas)?;

    let calldata = fill_with_zeros(calldata, 96)?;

    let point_x = parse_bn254_coordinate(calldata.get(0..32).ok_or(InternalError::SlicingError)?)?;
    let point_y = parse_bn254_coordinate(calldata.get(32..64).ok_or(InternalError::SlicingError)?)?;
    let scalar = LambdaworksU256::from_bytes_be(
        calldata.get(64..96).ok_or(InternalError::SlicingError)?,
    )
    .map_err(|_| PrecompileError::ParsingInputError)?;

    let point_zero = BN254FieldElement::from(0);
    if point_x.eq(&point_zero) && point_y.eq(&point_zero) {
        return Ok(Bytes::from([0u8; 64].to_vec()));
    }

    let point = BN254Curve::create_point_from_affine(point_x, point_y)
        .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;

    if scalar == LambdaworksU256::from_u64(0) {
        return Ok(Bytes::from([0u8; 64].to_vec()));
    }

    let product = point.operate_with_self(scalar);
    if product.is_neutral_element() {
        Ok(Bytes::from([0u8; 64].to_vec()))
    } else {
        Ok(affine_point_to_bytes(&product.to_affine()))
    }
}

fn affine_point_to_bytes(point: &ShortWeierstrassProjectivePoint<BN254Curve>) -> Bytes {
    let result = [point.x().to_bytes_be(), point.y().to_bytes_be()].concat();
    Bytes::from(result)
}

/// BN254 pairing check (address 0x08, EIP-197). Input is a sequence of
/// 192-byte (G1, G2) groups; the output word is 1 iff the product of the
/// pairings is the identity.
#[allow(clippy::arithmetic_side_effects)]
pub fn ecpairing(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
    spec: &ForkSpec,
) -> Result<Bytes, VMError> {
    if calldata.len() % 192 != 0 {
        return Err(VMError::PrecompileError(PrecompileError::ParsingInputError));
    }
    let group_count = u64::try_from(calldata.len() / 192)
        .map_err(|_| PrecompileError::ParsingInputError)?;

    increase_precompile_consumed_gas(
        gas_for_call,
        gas_cost::ecpairing(group_count, spec)?,
        consumed_gas,
    )?;

    let mut accumulator = FieldElement::<Degree12ExtensionField>::one();

    for group_index in 0..calldata.len() / 192 {
        let group_start = group_index
            .checked_mul(192)
            .ok_or(InternalError::ArithmeticOperationOverflow)?;
        let group = calldata
            .get(group_start..group_start.checked_add(192).ok_or(
                InternalError::ArithmeticOperationOverflow,
            )?)
            .ok_or(InternalError::SlicingError)?;

        let g1_x = parse_bn254_coordinate(group.get(0..32).ok_or(InternalError::SlicingError)?)?;
        let g1_y = parse_bn254_coordinate(group.get(32..64).ok_or(InternalError::SlicingError)?)?;

        // G2 coordinates arrive imaginary-part first
        let g2_x_im = group.get(64..96).ok_or(InternalError::SlicingError)?;
        let g2_x_re = group.get(96..128).ok_or(InternalError::SlicingError)?;
        let g2_y_im = group.get(128..160).ok_or(InternalError::SlicingError)?;
        let g2_y_re = group.get(160..192).ok_or(InternalError::SlicingError)?;
        for coordinate in [g2_x_im, g2_x_re, g2_y_im, g2_y_re] {
            let raw = LambdaworksU256::from_bytes_be(coordinate)
                .map_err(|_| PrecompileError::ParsingInputError)?;
            if raw >= ALT_BN128_PRIME {
                return Err(VMError::PrecompileError(PrecompileError::ParsingInputError));
            }
        }

        let point_zero = BN254FieldElement::from(0);
        let g1_is_zero = g1_x.eq(&point_zero) && g1_y.eq(&point_zero);
        let g2_is_zero = g2_x_im.iter().all(|byte| *byte == 0)
            && g2_x_re.iter().all(|byte| *byte == 0)
            && g2_y_im.iter().all(|byte| *byte == 0)
            && g2_y_re.iter().all(|byte| *byte == 0);

        // both points must still be well-formed even when skipped
        let g1_point = if g1_is_zero {
            None
        } else {
            Some(
                BN254Curve::create_point_from_affine(g1_x, g1_y)
                    .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?,
            )
        };
        let g2_point = if g2_is_zero {
            None
        } else {
            let x = build_twist_field_element(g2_x_re, g2_x_im)?;
            let y = build_twist_field_element(g2_y_re, g2_y_im)?;
            let point = BN254TwistCurve::create_point_from_affine(x, y)
                .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;
            // G2 membership is not implied by the curve equation
            if !point.operate_with_self(ALT_BN128_ORDER).is_neutral_element() {
                return Err(VMError::PrecompileError(PrecompileError::PointNotInSubgroup));
            }
            Some(point)
        };

        // a pair with a point at infinity contributes the identity
        let (Some(g1_point), Some(g2_point)) = (g1_point, g2_point) else {
            continue;
        };

        let pairing_result = BN254AtePairing::compute_batch(&[(&g1_point, &g2_point)])
            .map_err(|_| PrecompileError::InvalidEllipticCurvePoint)?;
        accumulator = accumulator * pairing_result;
    }

    let mut output = [0u8; 32];
    if accumulator == FieldElement::<Degree12ExtensionField>::one() {
        output[31] = 1;
    }
    Ok(Bytes::from(output.to_vec()))
}

fn build_twist_field_element(
    real: &[u8],
    imaginary: &[u8],
) -> Result<FieldElement<Degree2ExtensionField>, VMError> {
    let real = BN254FieldElement::from_bytes_be(real)
        .map_err(|_| PrecompileError::ParsingInputError)?;
    let imaginary = BN254FieldElement::from_bytes_be(imaginary)
        .map_err(|_| PrecompileError::ParsingInputError)?;
    Ok(FieldElement::new([real, imaginary]))
}

const BLAKE2F_SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

const BLAKE2F_IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

#[allow(clippy::indexing_slicing)]
fn blake2f_g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// One run of the BLAKE2b compression function F (RFC 7693 §3.2).
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
fn blake2f_compress(rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: &[u64; 2], last_block: bool) {
    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&BLAKE2F_IV);
    v[12] ^= t[0];
    v[13] ^= t[1];
    if last_block {
        v[14] = !v[14];
    }

    for round in 0..rounds {
        let s = &BLAKE2F_SIGMA[usize::try_from(round).unwrap_or(0) % 10];
        blake2f_g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        blake2f_g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        blake2f_g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        blake2f_g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        blake2f_g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        blake2f_g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        blake2f_g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        blake2f_g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

/// BLAKE2b compression function (address 0x09, EIP-152).
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
pub fn blake2f(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    if calldata.len() != 213 {
        return Err(VMError::PrecompileError(PrecompileError::ParsingInputError));
    }

    let rounds_bytes: [u8; 4] = calldata[0..4]
        .try_into()
        .map_err(|_| PrecompileError::ParsingInputError)?;
    let rounds = u32::from_be_bytes(rounds_bytes);

    let gas_cost = u64::from(rounds)
        .checked_mul(BLAKE2F_ROUND_COST)
        .ok_or(OutOfGasError::GasCostOverflow)?;
    increase_precompile_consumed_gas(gas_for_call, gas_cost, consumed_gas)?;

    let mut h = [0u64; 8];
    for (i, state_word) in h.iter_mut().enumerate() {
        let start = 4 + i * 8;
        let word_bytes: [u8; 8] = calldata[start..start + 8]
            .try_into()
            .map_err(|_| PrecompileError::ParsingInputError)?;
        *state_word = u64::from_le_bytes(word_bytes);
    }

    let mut m = [0u64; 16];
    for (i, message_word) in m.iter_mut().enumerate() {
        let start = 68 + i * 8;
        let word_bytes: [u8; 8] = calldata[start..start + 8]
            .try_into()
            .map_err(|_| PrecompileError::ParsingInputError)?;
        *message_word = u64::from_le_bytes(word_bytes);
    }

    let mut t = [0u64; 2];
    for (i, offset_word) in t.iter_mut().enumerate() {
        let start = 196 + i * 8;
        let word_bytes: [u8; 8] = calldata[start..start + 8]
            .try_into()
            .map_err(|_| PrecompileError::ParsingInputError)?;
        *offset_word = u64::from_le_bytes(word_bytes);
    }

    let last_block = match calldata[212] {
        0 => false,
        1 => true,
        _ => return Err(VMError::PrecompileError(PrecompileError::ParsingInputError)),
    };

    blake2f_compress(rounds, &mut h, &m, &t, last_block);

    let mut output = Vec::with_capacity(64);
    for state_word in h {
        output.extend_from_slice(&state_word.to_le_bytes());
    }
    Ok(Bytes::from(output))
}

/// KZG point evaluation (address 0x0a, EIP-4844): proves that the blob
/// committed to by `commitment` evaluates to `y` at point `z`.
pub fn point_evaluation(
    calldata: &Bytes,
    gas_for_call: u64,
    consumed_gas: &mut u64,
) -> Result<Bytes, VMError> {
    if calldata.len() != 192 {
        return Err(VMError::PrecompileError(PrecompileError::ParsingInputError));
    }

    increase_precompile_consumed_gas(gas_for_call, POINT_EVALUATION_COST, consumed_gas)?;

    let versioned_hash = calldata.get(0..32).ok_or(InternalError::SlicingError)?;
    let z = calldata.get(32..64).ok_or(InternalError::SlicingError)?;
    let y = calldata.get(64..96).ok_or(InternalError::SlicingError)?;
    let commitment = calldata.get(96..144).ok_or(InternalError::SlicingError)?;
    let proof = calldata.get(144..192).ok_or(InternalError::SlicingError)?;

    // the versioned hash commits to the commitment itself
    let mut commitment_hash: Vec<u8> = sha2::Sha256::digest(commitment).to_vec();
    if let Some(version_byte) = commitment_hash.first_mut() {
        *version_byte = VERSIONED_HASH_VERSION_KZG;
    }
    if versioned_hash != commitment_hash {
        return Err(VMError::PrecompileError(
            PrecompileError::BlobVersionedHashMismatch,
        ));
    }

    let commitment =
        Bytes48::from_slice(commitment).map_err(|_| PrecompileError::ParsingInputError)?;
    let z = Bytes32::from_slice(z).map_err(|_| PrecompileError::ParsingInputError)?;
    let y = Bytes32::from_slice(y).map_err(|_| PrecompileError::ParsingInputError)?;
    let proof = Bytes48::from_slice(proof).map_err(|_| PrecompileError::ParsingInputError)?;

    let settings = kzg_rs::get_kzg_settings();
    let valid = KzgProof::verify_kzg_proof(&commitment, &z, &y, &proof, &settings)
        .map_err(|_| PrecompileError::EvaluationFailed)?;
    if !valid {
        return Err(VMError::PrecompileError(PrecompileError::EvaluationFailed));
    }

    // FIELD_ELEMENTS_PER_BLOB ++ BLS_MODULUS, both as 32-byte words
    let mut output = vec![0u8; 24];
    output.extend_from_slice(&FIELD_ELEMENTS_PER_BLOB.to_be_bytes());
    output.extend_from_slice(BLS_MODULUS);
    Ok(Bytes::from(output))
}
