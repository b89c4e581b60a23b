use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::{Error, Result};

/// Fixed AES-128 key baked into the device firmware.
pub const KEY: [u8; 16] = [0xff; 16];

const BLOCK_SIZE: usize = 16;

/// Decrypts ciphertext with AES-128-CBC using the fixed key and the given
/// IV. No padding is stripped; the input length must be a positive
/// multiple of the block size.
pub fn decrypt(iv: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::BadCipher(ciphertext.len()));
    }
    let cipher = Aes128::new(GenericArray::from_slice(&KEY));
    let mut cleartext = Vec::with_capacity(ciphertext.len());
    let mut prev = *iv;
    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cleartext.extend_from_slice(&block);
        prev.copy_from_slice(chunk);
    }
    Ok(cleartext)
}

/// Encrypts cleartext with AES-128-CBC using the fixed key and the given
/// IV. No padding is added; the input length must be a positive multiple
/// of the block size.
pub fn encrypt(iv: &[u8; 16], cleartext: &[u8]) -> Result<Vec<u8>> {
    if cleartext.is_empty() || cleartext.len() % BLOCK_SIZE != 0 {
        return Err(Error::BadCipher(cleartext.len()));
    }
    let cipher = Aes128::new(GenericArray::from_slice(&KEY));
    let mut ciphertext = Vec::with_capacity(cleartext.len());
    let mut prev = *iv;
    for chunk in cleartext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(&mut block);
        ciphertext.extend_from_slice(&block);
        prev.copy_from_slice(&block);
    }
    Ok(ciphertext)
}
