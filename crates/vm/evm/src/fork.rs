use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protocol versions in activation order.
///
/// The ordering is total and meaningful: a fork enables every EIP of the
/// forks before it, with the single documented exception of EIP-1283, which
/// Constantinople activated and Petersburg rolled back.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Shanghai,
    #[default]
    Cancun,
    Prague,
}

/// The per-EIP rule record that parameterizes the interpreter.
///
/// Derived once per frame chain from the active [`Fork`], then optionally
/// mutated by a chain's override layer; handlers treat it as immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkSpec {
    pub fork: Fork,

    // Homestead
    /// Out-of-gas creation failure semantics.
    pub eip2: bool,
    /// DELEGATECALL.
    pub eip7: bool,

    // Tangerine Whistle
    /// Gas repricing for IO-heavy operations and the 63/64 call rule.
    pub eip150: bool,

    // Spurious Dragon
    /// Replay protection via chain id.
    pub eip155: bool,
    /// EXP cost increase.
    pub eip160: bool,
    /// State clearing of empty accounts; created contracts start at nonce 1.
    pub eip161: bool,
    /// Runtime code size cap.
    pub eip170: bool,

    // Byzantium
    /// REVERT.
    pub eip140: bool,
    /// BN254 addition and scalar multiplication precompiles.
    pub eip196: bool,
    /// BN254 pairing check precompile.
    pub eip197: bool,
    /// MODEXP precompile.
    pub eip198: bool,
    /// RETURNDATASIZE / RETURNDATACOPY.
    pub eip211: bool,
    /// STATICCALL.
    pub eip214: bool,

    // Constantinople
    /// SHL / SHR / SAR.
    pub eip145: bool,
    /// CREATE2.
    pub eip1014: bool,
    /// EXTCODEHASH.
    pub eip1052: bool,
    /// Net SSTORE metering, Constantinople only (rolled back in Petersburg).
    pub eip1283: bool,

    // Istanbul
    /// BLAKE2F precompile.
    pub eip152: bool,
    /// BN254 precompile repricing.
    pub eip1108: bool,
    /// CHAINID opcode.
    pub eip1344: bool,
    /// SELFBALANCE and trie-access repricing.
    pub eip1884: bool,
    /// Calldata cost reduction (16 per non-zero byte).
    pub eip2028: bool,
    /// Net SSTORE metering with the 2300 sentry.
    pub eip2200: bool,

    // Berlin
    /// MODEXP repricing.
    pub eip2565: bool,
    /// Cold/warm access pricing.
    pub eip2929: bool,
    /// Typed access-list transactions.
    pub eip2930: bool,

    // London
    /// Base fee.
    pub eip1559: bool,
    /// BASEFEE opcode.
    pub eip3198: bool,
    /// Refund reduction.
    pub eip3529: bool,
    /// Reject deployed code starting with 0xef.
    pub eip3541: bool,

    // Shanghai
    /// Warm coinbase.
    pub eip3651: bool,
    /// PUSH0.
    pub eip3855: bool,
    /// Initcode size cap and metering.
    pub eip3860: bool,
    /// Consensus-layer withdrawals.
    pub eip4895: bool,

    // Cancun
    /// Transient storage.
    pub eip1153: bool,
    /// Beacon roots system contract.
    pub eip4788: bool,
    /// Blob transactions, BLOBHASH, point-evaluation precompile.
    pub eip4844: bool,
    /// MCOPY.
    pub eip5656: bool,
    /// SELFDESTRUCT only in the creating transaction.
    pub eip6780: bool,
    /// BLOBBASEFEE opcode.
    pub eip7516: bool,

    // Prague
    /// BLS12-381 precompiles.
    pub eip2537: bool,
    /// Historical block hashes system contract.
    pub eip2935: bool,
    /// Validator withdrawal requests system contract.
    pub eip7002: bool,
    /// General-purpose execution-layer requests.
    pub eip7685: bool,
    /// EOA set-code transactions.
    pub eip7702: bool,

    // Behavioral flags for alternate chains. Never derived from a fork;
    // only the override layer sets them.
    pub legacy_gas_only: bool,
    pub custom_gas_metering: bool,
    pub l1_data_fee: bool,

    /// Forced states for EIP numbers the record has no field for.
    overrides: HashMap<u64, bool>,
}

impl ForkSpec {
    /// Derives the flag record for a fork. Pure: identical inputs produce
    /// identical outputs.
    pub fn new(fork: Fork) -> Self {
        Self {
            fork,
            eip2: fork >= Fork::Homestead,
            eip7: fork >= Fork::Homestead,
            eip150: fork >= Fork::TangerineWhistle,
            eip155: fork >= Fork::SpuriousDragon,
            eip160: fork >= Fork::SpuriousDragon,
            eip161: fork >= Fork::SpuriousDragon,
            eip170: fork >= Fork::SpuriousDragon,
            eip140: fork >= Fork::Byzantium,
            eip196: fork >= Fork::Byzantium,
            eip197: fork >= Fork::Byzantium,
            eip198: fork >= Fork::Byzantium,
            eip211: fork >= Fork::Byzantium,
            eip214: fork >= Fork::Byzantium,
            eip145: fork >= Fork::Constantinople,
            eip1014: fork >= Fork::Constantinople,
            eip1052: fork >= Fork::Constantinople,
            // Activated in Constantinople, disabled again in Petersburg
            // because of the reentrancy hazard it opened up.
            eip1283: fork == Fork::Constantinople,
            eip152: fork >= Fork::Istanbul,
            eip1108: fork >= Fork::Istanbul,
            eip1344: fork >= Fork::Istanbul,
            eip1884: fork >= Fork::Istanbul,
            eip2028: fork >= Fork::Istanbul,
            eip2200: fork >= Fork::Istanbul,
            eip2565: fork >= Fork::Berlin,
            eip2929: fork >= Fork::Berlin,
            eip2930: fork >= Fork::Berlin,
            eip1559: fork >= Fork::London,
            eip3198: fork >= Fork::London,
            eip3529: fork >= Fork::London,
            eip3541: fork >= Fork::London,
            eip3651: fork >= Fork::Shanghai,
            eip3855: fork >= Fork::Shanghai,
            eip3860: fork >= Fork::Shanghai,
            eip4895: fork >= Fork::Shanghai,
            eip1153: fork >= Fork::Cancun,
            eip4788: fork >= Fork::Cancun,
            eip4844: fork >= Fork::Cancun,
            eip5656: fork >= Fork::Cancun,
            eip6780: fork >= Fork::Cancun,
            eip7516: fork >= Fork::Cancun,
            eip2537: fork >= Fork::Prague,
            eip2935: fork >= Fork::Prague,
            eip7002: fork >= Fork::Prague,
            eip7685: fork >= Fork::Prague,
            eip7702: fork >= Fork::Prague,
            legacy_gas_only: false,
            custom_gas_metering: false,
            l1_data_fee: false,
            overrides: HashMap::new(),
        }
    }

    /// Whether the EIP with the given number is active. Unknown numbers are
    /// inactive unless forced.
    pub fn is_enabled(&self, eip: u64) -> bool {
        if let Some(forced) = self.overrides.get(&eip) {
            return *forced;
        }
        match self.flag(eip) {
            Some(enabled) => enabled,
            None => false,
        }
    }

    /// Forces an EIP on, regardless of the fork it belongs to. Applied after
    /// derivation; alternate chains may use this to break monotonicity.
    pub fn force_enable_eip(&mut self, eip: u64) {
        self.force_set(eip, true);
    }

    /// Forces an EIP off, regardless of the fork it belongs to.
    pub fn force_disable_eip(&mut self, eip: u64) {
        self.force_set(eip, false);
    }

    fn force_set(&mut self, eip: u64, enabled: bool) {
        if let Some(flag) = self.flag_mut(eip) {
            *flag = enabled;
        } else {
            self.overrides.insert(eip, enabled);
        }
    }

    fn flag(&self, eip: u64) -> Option<bool> {
        let flag = match eip {
            2 => self.eip2,
            7 => self.eip7,
            150 => self.eip150,
            155 => self.eip155,
            160 => self.eip160,
            161 => self.eip161,
            170 => self.eip170,
            140 => self.eip140,
            196 => self.eip196,
            197 => self.eip197,
            198 => self.eip198,
            211 => self.eip211,
            214 => self.eip214,
            145 => self.eip145,
            1014 => self.eip1014,
            1052 => self.eip1052,
            1283 => self.eip1283,
            152 => self.eip152,
            1108 => self.eip1108,
            1344 => self.eip1344,
            1884 => self.eip1884,
            2028 => self.eip2028,
            2200 => self.eip2200,
            2565 => self.eip2565,
            2929 => self.eip2929,
            2930 => self.eip2930,
            1559 => self.eip1559,
            3198 => self.eip3198,
            3529 => self.eip3529,
            3541 => self.eip3541,
            3651 => self.eip3651,
            3855 => self.eip3855,
            3860 => self.eip3860,
            4895 => self.eip4895,
            1153 => self.eip1153,
            4788 => self.eip4788,
            4844 => self.eip4844,
            5656 => self.eip5656,
            6780 => self.eip6780,
            7516 => self.eip7516,
            2537 => self.eip2537,
            2935 => self.eip2935,
            7002 => self.eip7002,
            7685 => self.eip7685,
            7702 => self.eip7702,
            _ => return None,
        };
        Some(flag)
    }

    fn flag_mut(&mut self, eip: u64) -> Option<&mut bool> {
        let flag = match eip {
            2 => &mut self.eip2,
            7 => &mut self.eip7,
            150 => &mut self.eip150,
            155 => &mut self.eip155,
            160 => &mut self.eip160,
            161 => &mut self.eip161,
            170 => &mut self.eip170,
            140 => &mut self.eip140,
            196 => &mut self.eip196,
            197 => &mut self.eip197,
            198 => &mut self.eip198,
            211 => &mut self.eip211,
            214 => &mut self.eip214,
            145 => &mut self.eip145,
            1014 => &mut self.eip1014,
            1052 => &mut self.eip1052,
            1283 => &mut self.eip1283,
            152 => &mut self.eip152,
            1108 => &mut self.eip1108,
            1344 => &mut self.eip1344,
            1884 => &mut self.eip1884,
            2028 => &mut self.eip2028,
            2200 => &mut self.eip2200,
            2565 => &mut self.eip2565,
            2929 => &mut self.eip2929,
            2930 => &mut self.eip2930,
            1559 => &mut self.eip1559,
            3198 => &mut self.eip3198,
            3529 => &mut self.eip3529,
            3541 => &mut self.eip3541,
            3651 => &mut self.eip3651,
            3855 => &mut self.eip3855,
            3860 => &mut self.eip3860,
            4895 => &mut self.eip4895,
            1153 => &mut self.eip1153,
            4788 => &mut self.eip4788,
            4844 => &mut self.eip4844,
            5656 => &mut self.eip5656,
            6780 => &mut self.eip6780,
            7516 => &mut self.eip7516,
            2537 => &mut self.eip2537,
            2935 => &mut self.eip2935,
            7002 => &mut self.eip7002,
            7685 => &mut self.eip7685,
            7702 => &mut self.eip7702,
            _ => return None,
        };
        Some(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::{Fork, ForkSpec};

    #[test]
    fn derivation_is_monotone() {
        let forks = [
            Fork::Frontier,
            Fork::Homestead,
            Fork::TangerineWhistle,
            Fork::SpuriousDragon,
            Fork::Byzantium,
            Fork::Constantinople,
            Fork::Petersburg,
            Fork::Istanbul,
            Fork::Berlin,
            Fork::London,
            Fork::Shanghai,
            Fork::Cancun,
            Fork::Prague,
        ];
        let eips: [u64; 10] = [150, 161, 214, 1014, 2929, 3529, 3855, 1153, 2935, 7702];
        for pair in forks.windows(2) {
            let earlier = ForkSpec::new(pair[0]);
            let later = ForkSpec::new(pair[1]);
            for eip in eips {
                assert!(
                    !earlier.is_enabled(eip) || later.is_enabled(eip),
                    "{eip} regressed between {:?} and {:?}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn eip1283_is_constantinople_only() {
        assert!(!ForkSpec::new(Fork::Byzantium).is_enabled(1283));
        assert!(ForkSpec::new(Fork::Constantinople).is_enabled(1283));
        assert!(!ForkSpec::new(Fork::Petersburg).is_enabled(1283));
        // Istanbul supersedes it with EIP-2200.
        let istanbul = ForkSpec::new(Fork::Istanbul);
        assert!(!istanbul.is_enabled(1283));
        assert!(istanbul.is_enabled(2200));
    }

    #[test]
    fn unknown_eips_are_disabled() {
        let spec = ForkSpec::new(Fork::Prague);
        assert!(!spec.is_enabled(9999));
    }

    #[test]
    fn overrides_win_over_derivation() {
        let mut spec = ForkSpec::new(Fork::London);
        assert!(spec.is_enabled(1559));
        spec.force_disable_eip(1559);
        assert!(!spec.is_enabled(1559));
        spec.force_enable_eip(9069);
        assert!(spec.is_enabled(9069));
    }
}
