fn main() {
    meme_sifter_lib::run()
}
